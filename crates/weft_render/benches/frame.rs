use criterion::{black_box, criterion_group, criterion_main, Criterion};
use weft_core::{NodeId, NodeTree, Rect, Size};
use weft_render::{HeadlessFactory, ManualFrames, RenderScheduler};

/// 10 panels of 10 leaves each under the display
fn build(tree: &mut NodeTree) -> Vec<NodeId> {
    let mut leaves = Vec::new();
    for i in 0..10 {
        let panel = tree.create_node(Rect::new(0.0, i as f32 * 40.0, 400.0, 40.0));
        let _ = tree.add_child(tree.root(), panel);
        for j in 0..10 {
            let leaf = tree.create_node(Rect::new(j as f32 * 40.0, 0.0, 40.0, 40.0));
            let _ = tree.add_child(panel, leaf);
            leaves.push(leaf);
        }
    }
    leaves
}

fn bench_frame(c: &mut Criterion) {
    let mut tree = NodeTree::new(Size::new(800.0, 600.0));
    let frames = ManualFrames::new();
    let mut scheduler = RenderScheduler::new(&mut tree, HeadlessFactory::new(), frames.clone());
    let leaves = build(&mut tree);
    scheduler.pump(&mut tree);
    frames.take();
    scheduler.on_frame(&mut tree);

    c.bench_function("repaint_100_leaves", |b| {
        b.iter(|| {
            for &leaf in &leaves {
                scheduler.mark_for_render(&tree, leaf);
            }
            frames.take();
            black_box(scheduler.on_frame(&mut tree))
        })
    });

    c.bench_function("resize_display", |b| {
        let mut wide = false;
        b.iter(|| {
            wide = !wide;
            let width = if wide { 1024.0 } else { 800.0 };
            let root = tree.root();
            tree.set_size(root, Size::new(width, 600.0));
            scheduler.pump(&mut tree);
            frames.take();
            black_box(scheduler.on_frame(&mut tree))
        })
    });
}

criterion_group!(benches, bench_frame);
criterion_main!(benches);
