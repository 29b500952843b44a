//! Interactive walkthrough of the allocator, gated on ENTER so you can
//! inspect the process with `pmap`, `htop`, or `gdb` between steps.
//!
//! Set `RUST_LOG=debug` to see the allocator's own `log` output
//! (heap growth, free-index reuse, double-free defense) interleaved
//! with this driver's narration.

use std::io::Read;
use std::mem::size_of;
use std::ptr;

use rallocator::Allocator;

fn block_until_enter_pressed() {
    println!("\n>>> Press ENTER to continue...");
    let _ = std::io::stdin().bytes().next();
}

fn print_state(label: &str, alloc: &Allocator) {
    println!(
        "[{label}] high-water mark = {:#x}\nfree tree:\n{:?}",
        alloc.high_water_mark(),
        alloc.free_tree()
    );
}

fn main() {
    env_logger::init();

    let mut alloc = Allocator::new();

    print_state("start", &alloc);
    block_until_enter_pressed();

    // 1) Five 16-byte blocks, so we can demonstrate best-fit reuse later.
    println!("\n[1] Allocate five 16-byte blocks");
    let blocks: Vec<*mut u8> = (0..5).map(|_| unsafe { alloc.allocate(16) }).collect();
    for (i, p) in blocks.iter().enumerate() {
        println!("    block {i} = {p:p}");
    }
    print_state("after five allocations", &alloc);
    block_until_enter_pressed();

    // 2) Free two middle blocks — they join the free-region index.
    println!("\n[2] Free block 1 and block 3");
    unsafe {
        alloc.free(blocks[1]);
        alloc.free(blocks[3]);
    }
    print_state("after freeing 1 and 3", &alloc);
    block_until_enter_pressed();

    // 3) Allocate a same-size block; best-fit should reuse one of the two.
    println!("\n[3] Allocate another 16-byte block (watch it reuse block 1 or 3)");
    let reused = unsafe { alloc.allocate(16) };
    println!(
        "    got {reused:p} ({})",
        if reused == blocks[1] || reused == blocks[3] {
            "reused a freed block"
        } else {
            "grew the heap instead"
        }
    );
    block_until_enter_pressed();

    // 4) Grow a 10-slot i32 array to 20 slots via reallocate.
    println!("\n[4] Allocate 10 i32s, write i*i, then reallocate to 20 slots");
    unsafe {
        let mut p = alloc.allocate(10 * size_of::<i32>()) as *mut i32;
        for i in 0..10i32 {
            p.add(i as usize).write(i * i);
        }
        p = alloc.reallocate(p as *mut u8, 20 * size_of::<i32>()) as *mut i32;
        for i in 10..20i32 {
            p.add(i as usize).write(i * i);
        }
        println!("    slot 15 = {}, slot 19 = {}", p.add(15).read(), p.add(19).read());
    }
    print_state("after grow via reallocate", &alloc);
    block_until_enter_pressed();

    // 5) A large zero_allocate to show a fresh heap-growth event.
    println!("\n[5] zero_allocate(1024, size_of::<u8>())");
    let big = unsafe { alloc.zero_allocate(1024, 1) };
    println!("    got {big:p}, first byte = {}", unsafe { ptr::read(big) });
    print_state("after large zero_allocate", &alloc);

    println!("\n[6] End of demo. Process exit reclaims everything the OS lent us.");
}
