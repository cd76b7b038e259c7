//! End-to-end dispatch scenarios against the default provider.
//!
//! Each test builds a small graph, dispatches one or more operations, and
//! checks the recorded custom call and the shapes handed back.

use lapax_dispatch::{
    DispatchError, Dispatcher, ErrorKind, LuKernel, SvdOptions, SvdPath, TrsmOptions,
};
use lapax_ir::{ArrayShape, Builder, DType, Graph, Node, Op};
use lapax_provider::{default_provider, KernelProvider, KernelTarget, ProviderError};

fn param(graph: &mut Graph, dtype: DType, dims: &[usize]) -> Op {
    graph.parameter(ArrayShape::new(dtype, dims.iter().copied()))
}

fn shape(graph: &Graph, op: Op) -> String {
    graph.array_shape(op).unwrap().to_string()
}

fn tuple_index(graph: &Graph, op: Op) -> Option<usize> {
    match graph.node(op)? {
        Node::GetTupleElement { index, .. } => Some(*index),
        _ => None,
    }
}

// ============================================================
// Cholesky
// ============================================================

#[test]
fn test_potrf_batched() {
    let provider = default_provider();
    let dispatcher = Dispatcher::new(provider.as_ref());
    let mut graph = Graph::new();
    let a = param(&mut graph, DType::Float32, &[10, 4, 4]);

    let out = dispatcher.potrf(&mut graph, a, true).unwrap();
    assert_eq!(shape(&graph, out.factor), "f32[10,4,4]{1,2,0}");
    assert_eq!(shape(&graph, out.info), "s32[10]{0}");

    let calls: Vec<_> = graph.custom_calls().collect();
    assert_eq!(calls.len(), 1);
    let call = calls[0];
    assert_eq!(call.target, KernelTarget::Potrf.as_str());
    assert_eq!(call.operands, vec![a]);
    assert_eq!(call.result.arity(), 3);

    let workspace = call.result.element(2).unwrap();
    assert_eq!(workspace.dtype, DType::Int8);
    assert_eq!(workspace.layout.as_ref().unwrap().as_slice(), &[0]);
}

// ============================================================
// Triangular solve
// ============================================================

#[test]
fn test_trsm_batch_mismatch_emits_nothing() {
    let provider = default_provider();
    let dispatcher = Dispatcher::new(provider.as_ref());
    let mut graph = Graph::new();
    let a = param(&mut graph, DType::Float32, &[2, 3, 5, 5]);
    let b = param(&mut graph, DType::Float32, &[2, 4, 5, 5]);

    let options = TrsmOptions {
        left_side: true,
        ..TrsmOptions::default()
    };
    let err = dispatcher.trsm(&mut graph, a, b, options).unwrap_err();
    assert!(matches!(err, DispatchError::ShapeMismatch { op: "trsm", .. }));
    assert!(err.to_string().contains("f32[2,3,5,5]"));
    assert!(err.to_string().contains("f32[2,4,5,5]"));
    assert_eq!(graph.custom_calls().count(), 0);
}

#[test]
fn test_trsm_unbatched_runs_as_batch_of_one() {
    let provider = default_provider();
    let dispatcher = Dispatcher::new(provider.as_ref());
    let mut graph = Graph::new();
    let a = param(&mut graph, DType::Complex64, &[3, 3]);
    let b = param(&mut graph, DType::Complex64, &[5, 3]);

    let options = TrsmOptions {
        transpose_a: true,
        conjugate_a: true,
        ..TrsmOptions::default()
    };
    let out = dispatcher.trsm(&mut graph, a, b, options).unwrap();
    assert_eq!(shape(&graph, out.solution), "c64[5,3]{0,1}");
    assert_eq!(tuple_index(&graph, out.solution), Some(0));
}

// ============================================================
// LU
// ============================================================

#[test]
fn test_getrf_selection() {
    let provider = default_provider();
    let dispatcher = Dispatcher::new(provider.as_ref());
    let mut graph = Graph::new();

    let small = param(&mut graph, DType::Float32, &[4, 8, 8]);
    let large = param(&mut graph, DType::Float32, &[1024, 1024]);

    let small = dispatcher.getrf(&mut graph, small).unwrap();
    let large = dispatcher.getrf(&mut graph, large).unwrap();
    assert_eq!(small.kernel, LuKernel::Batched);
    assert_eq!(large.kernel, LuKernel::General);

    let targets: Vec<_> = graph.custom_calls().map(|c| c.target.as_str()).collect();
    assert_eq!(targets, vec!["hipblas_getrf_batched", "hipsolver_getrf"]);

    assert_eq!(shape(&graph, large.pivots), "s32[1024]{0}");
    assert_eq!(shape(&graph, large.info), "s32[]{}");
}

#[test]
fn test_getrf_output_order() {
    let provider = default_provider();
    let dispatcher = Dispatcher::new(provider.as_ref());
    let mut graph = Graph::new();
    let a = param(&mut graph, DType::Float64, &[2, 5, 3]);

    let out = dispatcher.getrf(&mut graph, a).unwrap();
    assert_eq!(tuple_index(&graph, out.lu), Some(0));
    assert_eq!(tuple_index(&graph, out.pivots), Some(1));
    assert_eq!(tuple_index(&graph, out.info), Some(2));
}

#[test]
fn test_getrf_empty_batch_with_huge_prefix() {
    let provider = default_provider();
    let dispatcher = Dispatcher::new(provider.as_ref());
    let mut graph = Graph::new();
    let a = param(&mut graph, DType::Float32, &[1 << 33, 1 << 33, 0, 4, 4]);

    let out = dispatcher.getrf(&mut graph, a).unwrap();
    assert_eq!(out.kernel, LuKernel::General);
    assert_eq!(
        graph.array_shape(out.info).unwrap().dims.as_slice(),
        &[1 << 33, 1 << 33, 0]
    );
}

// ============================================================
// QR
// ============================================================

#[test]
fn test_geqrf_then_orgqr() {
    let provider = default_provider();
    let dispatcher = Dispatcher::new(provider.as_ref());
    let mut graph = Graph::new();
    let a = param(&mut graph, DType::Float32, &[3, 8, 5]);

    let qr = dispatcher.geqrf(&mut graph, a).unwrap();
    assert_eq!(shape(&graph, qr.tau), "f32[3,5]{1,0}");

    let q = dispatcher.orgqr(&mut graph, qr.reflectors, qr.tau).unwrap();
    assert_eq!(shape(&graph, q.q), "f32[3,8,5]{1,2,0}");
    assert_eq!(shape(&graph, q.info), "s32[3]{0}");
    assert_eq!(graph.custom_calls().count(), 2);
}

#[test]
fn test_orgqr_too_many_reflectors() {
    let provider = default_provider();
    let dispatcher = Dispatcher::new(provider.as_ref());
    let mut graph = Graph::new();
    let a = param(&mut graph, DType::Float32, &[6, 4]);
    let tau = param(&mut graph, DType::Float32, &[5]);

    let err = dispatcher.orgqr(&mut graph, a, tau).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);
}

// ============================================================
// Eigendecomposition
// ============================================================

#[test]
fn test_syevd_batched() {
    let provider = default_provider();
    let dispatcher = Dispatcher::new(provider.as_ref());
    let mut graph = Graph::new();
    let a = param(&mut graph, DType::Float32, &[2, 3, 6, 6]);

    let out = dispatcher.syevd(&mut graph, a, false).unwrap();
    assert_eq!(shape(&graph, out.vectors), "f32[2,3,6,6]{2,3,1,0}");
    assert_eq!(shape(&graph, out.values), "f32[2,3,6]{2,1,0}");
    assert_eq!(shape(&graph, out.info), "s32[2,3]{1,0}");
}

// ============================================================
// SVD
// ============================================================

#[test]
fn test_gesvd_wide_full() {
    let provider = default_provider();
    let dispatcher = Dispatcher::new(provider.as_ref());
    let mut graph = Graph::new();
    let a = param(&mut graph, DType::Float32, &[3, 5]);

    let out = dispatcher.gesvd(&mut graph, a, SvdOptions::default()).unwrap();
    assert_eq!(out.path, SvdPath::Transposed);
    assert_eq!(shape(&graph, out.s), "f32[3]{0}");
    assert_eq!(shape(&graph, out.u), "f32[3,3]{1,0}");
    assert_eq!(shape(&graph, out.vt), "f32[5,5]{1,0}");

    // The kernel writes its own left vectors (our vt) first.
    assert_eq!(tuple_index(&graph, out.vt), Some(2));
    assert_eq!(tuple_index(&graph, out.u), Some(3));

    let call = graph.custom_calls().next().unwrap();
    assert_eq!(call.operand_shapes[0].to_string(), "f32[3,5]{1,0}");

    let expected = provider
        .gesvd(
            DType::Float32,
            1,
            5,
            3,
            lapax_provider::SvdJob {
                compute_uv: true,
                full_matrices: true,
            },
        )
        .unwrap();
    assert_eq!(call.opaque, expected.opaque.as_bytes());
}

#[test]
fn test_gesvd_wide_economy() {
    let provider = default_provider();
    let dispatcher = Dispatcher::new(provider.as_ref());
    let mut graph = Graph::new();
    let a = param(&mut graph, DType::Float64, &[4, 3, 5]);

    let options = SvdOptions {
        full_matrices: false,
        ..SvdOptions::default()
    };
    let out = dispatcher.gesvd(&mut graph, a, options).unwrap();
    assert_eq!(graph.array_shape(out.u).unwrap().dims.as_slice(), &[4, 3, 3]);
    assert_eq!(graph.array_shape(out.vt).unwrap().dims.as_slice(), &[4, 3, 5]);
    assert!(matches!(graph.node(out.vt), Some(Node::Slice { .. })));
}

#[test]
fn test_gesvd_tall_economy() {
    let provider = default_provider();
    let dispatcher = Dispatcher::new(provider.as_ref());
    let mut graph = Graph::new();
    let a = param(&mut graph, DType::Float32, &[7, 2]);

    let options = SvdOptions {
        full_matrices: false,
        ..SvdOptions::default()
    };
    let out = dispatcher.gesvd(&mut graph, a, options).unwrap();
    assert_eq!(out.path, SvdPath::Direct);
    assert_eq!(graph.array_shape(out.u).unwrap().dims.as_slice(), &[7, 2]);
    assert_eq!(graph.array_shape(out.vt).unwrap().dims.as_slice(), &[2, 2]);
}

// ============================================================
// Provider failures
// ============================================================

#[test]
fn test_integer_operand_rejected_by_provider() {
    let provider = default_provider();
    let dispatcher = Dispatcher::new(provider.as_ref());
    let mut graph = Graph::new();
    let a = param(&mut graph, DType::Int32, &[4, 4]);

    let err = dispatcher.geqrf(&mut graph, a).unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Descriptor(ProviderError::UnsupportedDType {
            kernel: KernelTarget::Geqrf,
            dtype: DType::Int32,
        })
    ));
    assert_eq!(graph.custom_calls().count(), 0);
}

#[test]
fn test_rank_one_operand() {
    let provider = default_provider();
    let dispatcher = Dispatcher::new(provider.as_ref());
    let mut graph = Graph::new();
    let a = param(&mut graph, DType::Float32, &[9]);

    for err in [
        dispatcher.potrf(&mut graph, a, true).unwrap_err(),
        dispatcher.getrf(&mut graph, a).unwrap_err(),
        dispatcher.gesvd(&mut graph, a, SvdOptions::default()).unwrap_err(),
    ] {
        assert!(matches!(err, DispatchError::RankTooSmall { rank: 1, .. }));
    }
}
