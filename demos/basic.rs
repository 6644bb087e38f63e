//! Walks through the life of a heap backed by the real kernel.
//!
//! Run with `RUST_LOG=debug cargo run --example basic` to see the block list
//! after every step.

use std::ptr::NonNull;

use memheap::{Heap, OutOfMemory};

fn log_alloc(label: &str, size: usize, addr: NonNull<u8>) {
    println!("[{label}] requested {size} bytes, received {addr:?}");
}

fn main() -> Result<(), OutOfMemory> {
    env_logger::init();

    let mut heap = Heap::new();
    let start = heap.init(4096)?;
    println!("Heap starts at {start:?}");
    heap.debug_heap();

    let a = heap.allocate(32)?;
    log_alloc("a", 32, a);
    let b = heap.allocate(32)?;
    log_alloc("b", 32, b);
    let c = heap.allocate(8)?;
    log_alloc("c", 8, c);
    heap.debug_heap();

    // Merge example
    unsafe {
        heap.release(a.as_ptr());
        heap.release(b.as_ptr());
    }

    let d = heap.allocate(64)?;
    log_alloc("d", 64, d);

    if d == a {
        println!("Correctly reused at {d:?}");
    } else {
        println!("Not correctly reused. A was at {a:?} and D is at {d:?}");
    }
    heap.debug_heap();

    // Growth example
    let big = heap.allocate(64 * 1024)?;
    log_alloc("big", 64 * 1024, big);
    unsafe { big.as_ptr().write_bytes(0xAB, 64 * 1024) };

    let stats = heap.stats();
    println!(
        "{} blocks ({} free), {} usable bytes, {} bytes mapped",
        stats.blocks, stats.free_blocks, stats.capacity, stats.mapped
    );
    heap.debug_heap();

    unsafe {
        heap.release(big.as_ptr());
        heap.release(c.as_ptr());
        heap.release(d.as_ptr());
    }

    Ok(())
}
