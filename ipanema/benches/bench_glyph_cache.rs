extern crate criterion;
extern crate ipanema;

#[path = "../tests/support/mod.rs"]
mod support;

use criterion::{criterion_group, criterion_main, Criterion};
use ipanema::{FontDef, Fixed, RasterConfig, Transform};
use std::hint::black_box;

fn bench_glyph_cache(c: &mut Criterion) {
    let mut context = support::context();
    let cached = context
        .acquire_engine(&support::face_id(), FontDef::new(16.0))
        .expect("test font should open");

    c.bench_function("cached raster", |b| {
        b.iter(|| {
            for glyph in [support::GLYPH_A, support::GLYPH_O] {
                let raster = context.raster_for(
                    cached,
                    glyph,
                    Fixed::ZERO,
                    None,
                    &Transform::IDENTITY,
                );
                black_box(raster.and_then(|r| r.glyph().map(|g| g.width)));
            }
        })
    });

    let mut uncached = support::context_with(RasterConfig {
        glyph_cache: false,
        ..RasterConfig::default()
    });
    let handle = uncached
        .acquire_engine(&support::face_id(), FontDef::new(16.0))
        .expect("test font should open");

    c.bench_function("uncached raster", |b| {
        b.iter(|| {
            for glyph in [support::GLYPH_A, support::GLYPH_O] {
                let raster = uncached.raster_for(
                    handle,
                    glyph,
                    Fixed::ZERO,
                    None,
                    &Transform::IDENTITY,
                );
                black_box(raster.and_then(|r| r.glyph().map(|g| g.width)));
            }
        })
    });

    c.bench_function("layout", |b| {
        b.iter(|| black_box(context.string_to_glyphs(cached, "AO AO AO", false)))
    });
}

criterion_group!(benches, bench_glyph_cache);
criterion_main!(benches);
