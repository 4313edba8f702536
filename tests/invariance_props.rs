//! Property-based tests for the invariance constructions.
//!
//! Run with: cargo test --test invariance_props

use approx::assert_relative_eq;
use ndarray::{Array2, Array3, Axis};
use proptest::prelude::*;
use quad_invariance::core::{
    cyclic_product_invariant, cyclic_terms, find_checkpoint, group_average, max_rotation_deviation,
    roll_vertices, run_dir, Architecture, ChannelLayout, CheckpointTag,
};
use quad_invariance::geometry::{quads_to_tensor, Quad};
use quad_invariance::nn::{Head, QuadModel, QuadRegressor};
use rand::{rngs::StdRng, SeedableRng};

// =============================================================================
// Strategies
// =============================================================================

fn arb_quad() -> impl Strategy<Value = Quad> {
    prop::array::uniform4((-3.0..3.0f32, -3.0..3.0f32)).prop_map(Quad::from_coords)
}

fn arb_batch(max: usize) -> impl Strategy<Value = Vec<Quad>> {
    prop::collection::vec(arb_quad(), 1..=max)
}

// Coordinates in [-1, 1] keep degree-4 monomials small.
fn arb_unit_batch(max: usize) -> impl Strategy<Value = Vec<Quad>> {
    let unit_quad = prop::array::uniform4((-1.0..1.0f32, -1.0..1.0f32)).prop_map(Quad::from_coords);
    prop::collection::vec(unit_quad, 1..=max)
}

fn arb_features(width: usize) -> impl Strategy<Value = Array3<f32>> {
    (1..4usize).prop_flat_map(move |batch| {
        prop::collection::vec(-1.5..1.5f32, batch * 4 * width).prop_map(move |data| {
            Array3::from_shape_vec((batch, 4, width), data).unwrap()
        })
    })
}

fn build(arch: Architecture, seed: u64) -> QuadModel {
    let mut rng = StdRng::seed_from_u64(seed);
    arch.build(Head::Regression, &mut rng).unwrap()
}

fn assert_close(a: &Array2<f32>, b: &Array2<f32>) {
    assert_eq!(a.dim(), b.dim());
    for (x, y) in a.iter().zip(b.iter()) {
        assert_relative_eq!(*x, *y, epsilon = 1e-4, max_relative = 1e-4);
    }
}

// =============================================================================
// Group averaging
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any order-dependent function becomes invariant once averaged.
    #[test]
    fn proptest_group_average_is_invariant(features in arb_features(3), shift in 1..4usize) {
        // weights every vertex differently
        let process = |x: &Array3<f32>| -> quad_invariance::Result<Array2<f32>> {
            let batch = x.dim().0;
            Ok(Array2::from_shape_fn((batch, 2), |(b, o)| {
                (0..4).map(|v| (v as f32 + 1.0 + o as f32) * x[(b, v, 0)] * x[(b, v, (v + o) % 3)]).sum()
            }))
        };
        let base = group_average(&features, process).unwrap();
        let rolled = group_average(&roll_vertices(&features, shift), process).unwrap();
        assert_close(&base, &rolled);
    }

    /// Rolling by n is the identity and rolls compose additively.
    #[test]
    fn proptest_roll_composes(features in arb_features(2), a in 0..4usize, b in 0..4usize) {
        let twice = roll_vertices(&roll_vertices(&features, a), b);
        prop_assert_eq!(twice, roll_vertices(&features, (a + b) % 4));
        prop_assert_eq!(roll_vertices(&features, 4), features);
    }
}

// =============================================================================
// Algebraic invariant
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The cyclic product sum does not depend on the starting vertex.
    #[test]
    fn proptest_cyclic_product_is_invariant(features in arb_features(8), shift in 1..4usize) {
        for layout in [ChannelLayout::Interleaved, ChannelLayout::Blocked] {
            let base = cyclic_product_invariant(&features, layout).unwrap();
            let rolled = cyclic_product_invariant(&roll_vertices(&features, shift), layout).unwrap();
            assert_close(&base, &rolled);
        }
    }

    /// Summing the 4 product terms in any order gives the same value.
    #[test]
    fn proptest_term_sum_is_order_independent(features in arb_features(8), order in Just(vec![0usize, 1, 2, 3]).prop_shuffle()) {
        let terms = cyclic_terms(&features, ChannelLayout::Blocked).unwrap();
        let forward = terms.sum_axis(Axis(0));
        let mut permuted = Array2::zeros(forward.raw_dim());
        for s in order {
            permuted += &terms.index_axis(Axis(0), s);
        }
        assert_close(&forward, &permuted);
    }

    /// Every model built to be invariant ignores the labelling.
    #[test]
    fn proptest_invariant_models(quads in arb_batch(6), seed in 0..1000u64) {
        for arch in [
            Architecture::AlgebraicMlp { num_features: 4, channel_width: 8 },
            Architecture::AlgebraicConv { num_features: 4, channel_width: 8 },
            Architecture::AveragedMlp { num_features: 4 },
            Architecture::AveragedConv { num_features: 4, conv_width: 8 },
            Architecture::Segment { num_features: 4 },
        ] {
            let model = build(arch, seed);
            let base = model.forward(&quads_to_tensor(&quads)).unwrap();
            for k in 1..4 {
                let rotated: Vec<Quad> = quads.iter().map(|q| q.rotated(k)).collect();
                assert_close(&base, &model.forward(&quads_to_tensor(&rotated)).unwrap());
            }
        }
    }

    /// Learned monomial products are summed over the orbit too.
    #[test]
    fn proptest_learned_polynomial_is_invariant(quads in arb_unit_batch(3), seed in 0..1000u64) {
        let model = build(Architecture::from_run_name("maron", 4).unwrap(), seed);
        assert!(matches!(
            model.architecture(),
            Architecture::Polynomial { degree: 4, learned_products: true, .. }
        ));
        let base = model.forward(&quads_to_tensor(&quads)).unwrap();
        for k in 1..4 {
            let rotated: Vec<Quad> = quads.iter().map(|q| q.rotated(k)).collect();
            assert_close(&base, &model.forward(&quads_to_tensor(&rotated)).unwrap());
        }
    }

    /// Area, the target these models learn, is itself invariant.
    #[test]
    fn proptest_area_is_invariant(quad in arb_quad(), k in 0..4usize) {
        assert_relative_eq!(quad.area(), quad.rotated(k).area(), epsilon = 1e-4, max_relative = 1e-5);
    }
}

#[test]
fn test_unit_square_from_every_vertex() {
    let square = Quad::from_coords([(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
    for arch in [
        Architecture::from_run_name("my_inv_fc", 8).unwrap(),
        Architecture::from_run_name("my_inv_conv", 8).unwrap(),
        Architecture::from_run_name("avg_conv", 8).unwrap(),
        Architecture::Polynomial {
            num_features: 8,
            degree: 2,
            learned_products: false,
        },
    ] {
        let model = build(arch, 7);
        let base = model.forward(&quads_to_tensor(&[square])).unwrap();
        for k in 1..4 {
            let out = model.forward(&quads_to_tensor(&[square.rotated(k)])).unwrap();
            assert_close(&base, &out);
        }
    }
}

#[test]
fn test_message_passing_is_not_invariant() {
    let model = build(Architecture::from_run_name("message_passing", 32).unwrap(), 3);
    let quads = vec![
        Quad::from_coords([(0.0, 0.0), (2.0, 0.0), (1.5, 1.0), (-0.5, 2.0)]),
        Quad::from_coords([(1.0, -1.0), (3.0, 0.5), (0.0, 2.5), (-1.0, 0.0)]),
    ];
    assert!(max_rotation_deviation(&model, &quads).unwrap() > 1e-6);

    let invariant = build(Architecture::from_run_name("my_inv_fc", 8).unwrap(), 3);
    assert!(max_rotation_deviation(&invariant, &quads).unwrap() < 1e-3);
}

#[test]
fn test_checkpoint_discovery_prefers_longer_names() {
    let tmp = tempfile::tempdir().unwrap();
    let base = tmp.path().join("avg_fc");
    let dir = run_dir(&base, 4).join("checkpoints");
    std::fs::create_dir_all(&dir).unwrap();
    for step in [7, 70, 69, 8] {
        std::fs::write(dir.join(format!("best-{}.json", step)), "{}").unwrap();
    }

    let found = find_checkpoint(&base, 4, CheckpointTag::Best).unwrap();
    assert_eq!(found.file_name().unwrap(), "best-70.json");
}
