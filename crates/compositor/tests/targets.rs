mod common;

use compositor::RenderTargetPool;

use common::gpu;

#[test]
fn allocate_resize_and_release() {
    let Some(ctx) = gpu() else { return };
    let mut pool = RenderTargetPool::new();

    pool.allocate(&ctx, 32, 16).unwrap();
    assert!(pool.is_allocated());
    assert_eq!(pool.dimensions(), Some((32, 16)));
    let first = pool.texture_ids().unwrap();
    assert_ne!(first[0], first[1]);
    assert_eq!(pool.slot(1).unwrap().texture().size(), (32, 16));
    assert!(pool.slot(2).is_none());

    pool.resize(&ctx, 8, 8).unwrap();
    let second = pool.texture_ids().unwrap();
    assert_eq!(pool.dimensions(), Some((8, 8)));
    assert!(second.iter().all(|id| !first.contains(id)));

    pool.release();
    assert!(!pool.is_allocated());
    assert!(pool.texture_ids().is_none());
}

#[test]
fn failed_resize_keeps_the_current_pair() {
    let Some(ctx) = gpu() else { return };
    let mut pool = RenderTargetPool::new();
    pool.allocate(&ctx, 16, 16).unwrap();
    let ids = pool.texture_ids();

    let too_wide = ctx.max_texture_dimension() + 1;
    assert!(pool.resize(&ctx, too_wide, 16).is_err());
    assert_eq!(pool.texture_ids(), ids);
    assert_eq!(pool.dimensions(), Some((16, 16)));
}
