// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: the full auto-sharding pipeline.
//!
//! These tests exercise the complete flow from graph construction →
//! strategy enumeration → cost-graph condensation → solving →
//! back-annotation, using the in-tree exhaustive solver so the whole
//! pipeline runs without an external dependency.

use mesh_core::{ClusterEnv, DType, DeviceMesh, Shape, Sharding};
use op_graph::{
    graph::Validated, AliasSet, LivenessSchedule, NodeDef, OpGraph, OpKind,
    ShardingAnnotation,
};
use shard_planner::{
    build_request, enumerate_strategies, repair_reshards, rewrite_reduce_scatter,
    set_shardings, AutoShardingConfig, AutoShardingPass, CostGraph, PassOutcome,
    UnchangedReason,
};
use shard_solver::{
    ExhaustiveSolver, ShardingSolver, SolverError, SolverRequest, SolverResponse,
};

// ── Helpers ────────────────────────────────────────────────────

fn mesh_1x4() -> DeviceMesh {
    DeviceMesh::new((0..4).collect(), vec![4]).unwrap()
}

fn mesh_2x2() -> DeviceMesh {
    DeviceMesh::new((0..4).collect(), vec![2, 2]).unwrap()
}

fn validated(nodes: Vec<NodeDef>) -> OpGraph<Validated> {
    OpGraph::new("test".into(), nodes).validate().unwrap()
}

fn param(name: &str, dims: Vec<usize>) -> NodeDef {
    NodeDef::new(name, OpKind::Parameter, Shape::new(dims), DType::F32, vec![])
}

fn annotated_param(name: &str, dims: Vec<usize>, sharding: Sharding) -> NodeDef {
    let mut node = param(name, dims);
    node.sharding = Some(ShardingAnnotation::Leaf(sharding));
    node
}

fn unary(name: &str, dims: Vec<usize>, operand: usize) -> NodeDef {
    NodeDef::new(name, OpKind::Elementwise, Shape::new(dims), DType::F32, vec![operand])
}

fn run_pass(
    graph: &mut OpGraph<Validated>,
    mesh: &DeviceMesh,
    config: AutoShardingConfig,
) -> PassOutcome {
    let solver = ExhaustiveSolver::new();
    let pass = AutoShardingPass::new(config, &solver);
    pass.run(graph, mesh, &AliasSet::new(), None).unwrap()
}

/// Annotated leaf sharding of one node; panics when missing or tuple.
fn leaf_ann(graph: &OpGraph<Validated>, node: usize) -> Sharding {
    graph
        .node(node)
        .unwrap()
        .sharding
        .as_ref()
        .and_then(|a| a.as_leaf())
        .cloned()
        .unwrap()
}

// ── Full Pipeline Tests ────────────────────────────────────────

#[test]
fn test_trivial_mesh_replicates_everything() {
    let mesh = DeviceMesh::new(vec![0], vec![1]).unwrap();
    let mut graph = validated(vec![
        param("p0", vec![8, 8]),
        param("p1", vec![8, 8]),
        NodeDef::new("add", OpKind::Elementwise, Shape::matrix(8, 8), DType::F32, vec![0, 1]),
    ]);

    let outcome = run_pass(&mut graph, &mesh, AutoShardingConfig::default());
    assert_eq!(
        outcome,
        PassOutcome::Sharded {
            objective: 0.0,
            reshards: 0,
            reduce_scatter_regions: 0
        }
    );
    assert!(graph.fully_annotated());
    for i in 0..3 {
        assert_eq!(leaf_ann(&graph, i), Sharding::Replicated);
    }
}

#[test]
fn test_elementwise_chain_shards_end_to_end() {
    let mesh = mesh_1x4();
    let mut graph = validated(vec![
        param("p", vec![1024]),
        unary("neg", vec![1024], 0),
        unary("exp", vec![1024], 1),
        unary("tanh", vec![1024], 2),
    ]);

    let outcome = run_pass(&mut graph, &mesh, AutoShardingConfig::default());
    let PassOutcome::Sharded { objective, reshards, .. } = outcome else {
        panic!("expected a sharded graph");
    };
    // Tiling the whole chain moves no data at all.
    assert_eq!(objective, 0.0);
    assert_eq!(reshards, 0);
    for i in 0..4 {
        assert_eq!(leaf_ann(&graph, i), Sharding::split(1, 0, 0));
    }
}

#[test]
fn test_dot_space_split_needs_no_communication() {
    let mesh = mesh_1x4();
    let mut graph = validated(vec![
        param("lhs", vec![64, 128]),
        param("rhs", vec![128, 32]),
        NodeDef::new(
            "dot",
            OpKind::Dot { lhs_contracting: 1, rhs_contracting: 0 },
            Shape::matrix(64, 32),
            DType::F32,
            vec![0, 1],
        ),
    ]);

    let outcome = run_pass(&mut graph, &mesh, AutoShardingConfig::default());
    let PassOutcome::Sharded { objective, reshards, .. } = outcome else {
        panic!("expected a sharded graph");
    };
    // Row-splitting the lhs tiles the output for free: the rhs stays
    // replicated and the lhs rows are sliced locally.
    assert_eq!(objective, 0.0);
    assert_eq!(reshards, 0);
    assert_eq!(leaf_ann(&graph, 0), Sharding::split(2, 0, 0));
    assert_eq!(leaf_ann(&graph, 1), Sharding::Replicated);
    assert_eq!(leaf_ann(&graph, 2), Sharding::split(2, 0, 0));
}

#[test]
fn test_tuple_projection_follows_element() {
    let mesh = mesh_1x4();
    let mut graph = validated(vec![
        param("p", vec![64]),
        NodeDef {
            name: "t".into(),
            kind: OpKind::Tuple,
            output: op_graph::NodeOutput::Tuple {
                elements: vec![op_graph::NodeOutput::array(Shape::vector(64), DType::F32)],
            },
            operands: vec![0],
            sharding: None,
            depth: 0,
        },
        NodeDef::new(
            "gte",
            OpKind::GetTupleElement { index: 0 },
            Shape::vector(64),
            DType::F32,
            vec![1],
        ),
        unary("neg", vec![64], 2),
    ]);

    let outcome = run_pass(&mut graph, &mesh, AutoShardingConfig::default());
    let PassOutcome::Sharded { reshards, .. } = outcome else {
        panic!("expected a sharded graph");
    };
    assert_eq!(reshards, 0);
    assert!(graph.fully_annotated());
    let split = Sharding::split(1, 0, 0);
    assert_eq!(leaf_ann(&graph, 0), split);
    assert_eq!(
        graph.node(1).unwrap().sharding,
        Some(ShardingAnnotation::Tuple(vec![ShardingAnnotation::Leaf(split.clone())]))
    );
    assert_eq!(leaf_ann(&graph, 2), split);
    assert_eq!(leaf_ann(&graph, 3), split);
}

// ── Candidate Enumeration ──────────────────────────────────────

#[test]
fn test_elementwise_add_candidates_and_memory() {
    // Two replicated [1024] f32 operands on four devices: the add has
    // exactly one useful tiling plus replication, at 1 KB and 4 KB per
    // device.
    let mesh = mesh_1x4();
    let graph = validated(vec![
        param("p0", vec![1024]),
        param("p1", vec![1024]),
        NodeDef::new("add", OpKind::Elementwise, Shape::vector(1024), DType::F32, vec![0, 1]),
    ]);
    let (arena, _) = enumerate_strategies(&graph, &mesh, &AutoShardingConfig::default()).unwrap();

    let add = arena.leaf(arena.node_group(2));
    let names: Vec<&str> = add.strategies.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["S[0@0]", "R"]);
    assert_eq!(add.strategies[0].output_sharding, Sharding::split(1, 0, 0));
    assert_eq!(add.strategies[0].memory_cost, 1024.0);
    assert_eq!(add.strategies[1].output_sharding, Sharding::Replicated);
    assert_eq!(add.strategies[1].memory_cost, 4096.0);

    // Both operands line up candidate-for-candidate with the add.
    for &p in &[0, 1] {
        let leaf = arena.leaf(arena.node_group(p));
        assert_eq!(
            leaf.strategies.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            names,
        );
    }
}

// ── Decision Condensation ──────────────────────────────────────

#[test]
fn test_follow_chain_collapses_to_one_decision() {
    let mesh = mesh_1x4();
    let graph = validated(vec![
        param("p", vec![1024]),
        unary("neg", vec![1024], 0),
        unary("exp", vec![1024], 1),
        unary("tanh", vec![1024], 2),
    ]);
    let config = AutoShardingConfig::default();
    let (arena, _) = enumerate_strategies(&graph, &mesh, &config).unwrap();
    // 4 leaves, but the elementwise mirrors all merge into the
    // parameter's decision.
    assert_eq!(arena.num_leaves(), 4);
    let cost_graph = CostGraph::build(&graph, &arena, &AliasSet::new(), &mesh);
    assert_eq!(cost_graph.num_decisions(), 1);
    assert!(cost_graph.edges().is_empty());
}

#[test]
fn test_aligned_alias_converts_to_merged_decision() {
    let mesh = mesh_1x4();
    let nodes = vec![
        param("p0", vec![64]),
        param("p1", vec![64]),
        NodeDef::new("add", OpKind::Elementwise, Shape::vector(64), DType::F32, vec![0, 1]),
    ];
    let graph = validated(nodes.clone());
    let aliases = AliasSet::from_pairs(vec![(0, 2)]);
    let config = AutoShardingConfig::default();

    let (arena, _) = enumerate_strategies(&graph, &mesh, &config).unwrap();
    let cost_graph = CostGraph::build(&graph, &arena, &aliases, &mesh);
    // Candidate sets line up index-for-index, so the alias becomes a
    // merge instead of a solver constraint.
    assert_eq!(cost_graph.num_decisions(), 2);
    assert_eq!(cost_graph.decision_of_leaf(0), cost_graph.decision_of_leaf(2));
    assert!(cost_graph.aliases().is_empty());

    // End to end the donated pair picks the same layout.
    let mut graph = validated(nodes);
    let solver = ExhaustiveSolver::new();
    let pass = AutoShardingPass::new(config, &solver);
    let outcome = pass.run(&mut graph, &mesh, &aliases, None).unwrap();
    assert!(matches!(outcome, PassOutcome::Sharded { .. }));
    assert_eq!(leaf_ann(&graph, 0), leaf_ann(&graph, 2));
}

// ── Memory Budget ──────────────────────────────────────────────

#[test]
fn test_budget_forces_smaller_shards() {
    // One 16 KB parameter on a 2x2 mesh: a 1-D tiling leaves 8 KB per
    // device, only the 2-D tilings fit under 6 KB.
    let mesh = mesh_2x2();
    let mut graph = validated(vec![param("p", vec![64, 64])]);
    let config = AutoShardingConfig {
        memory_budget: Some("6KB".into()),
        ..AutoShardingConfig::default()
    };

    let outcome = run_pass(&mut graph, &mesh, config);
    assert!(matches!(outcome, PassOutcome::Sharded { .. }));
    assert_eq!(
        leaf_ann(&graph, 0),
        Sharding::Tiled { dim_to_mesh: vec![Some(0), Some(1)] }
    );

    // Without a budget the first 1-D tiling wins the tie.
    let mut graph = validated(vec![param("p", vec![64, 64])]);
    run_pass(&mut graph, &mesh, AutoShardingConfig::default());
    assert_eq!(leaf_ann(&graph, 0), Sharding::split(2, 0, 0));
}

#[test]
fn test_infeasible_budget_leaves_graph_unchanged() {
    let mesh = mesh_1x4();
    // 4 KB parameter; even the smallest shard is 1 KB.
    let mut graph = validated(vec![param("p", vec![1024])]);
    let config = AutoShardingConfig {
        memory_budget: Some("512".into()),
        ..AutoShardingConfig::default()
    };

    let outcome = run_pass(&mut graph, &mesh, config);
    assert_eq!(outcome, PassOutcome::Unchanged(UnchangedReason::Infeasible));
    assert!(graph.node(0).unwrap().sharding.is_none());
}

// ── Solver Outcomes ────────────────────────────────────────────

/// A solver that gives up immediately, as a real one does at its
/// wall-clock limit.
struct StallingSolver;

impl ShardingSolver for StallingSolver {
    fn name(&self) -> &str {
        "stalling"
    }

    fn solve(&self, _request: &SolverRequest) -> Result<SolverResponse, SolverError> {
        Ok(SolverResponse::Timeout)
    }
}

#[test]
fn test_solver_timeout_leaves_graph_unchanged() {
    let mesh = mesh_1x4();
    let mut graph = validated(vec![
        param("p", vec![1024]),
        unary("neg", vec![1024], 0),
    ]);

    let solver = StallingSolver;
    let pass = AutoShardingPass::new(AutoShardingConfig::default(), &solver);
    let outcome = pass.run(&mut graph, &mesh, &AliasSet::new(), None).unwrap();
    assert_eq!(outcome, PassOutcome::Unchanged(UnchangedReason::Timeout));
    assert_eq!(graph.num_nodes(), 2);
    for i in 0..2 {
        assert!(graph.node(i).unwrap().sharding.is_none());
    }
}

#[test]
fn test_trivial_mesh_never_consults_the_solver() {
    // With one device there is one candidate per value; the pass
    // annotates without solving, so a stalling solver cannot hurt it.
    let mesh = DeviceMesh::new(vec![0], vec![1]).unwrap();
    let mut graph = validated(vec![
        param("p", vec![1024]),
        unary("neg", vec![1024], 0),
    ]);

    let solver = StallingSolver;
    let pass = AutoShardingPass::new(AutoShardingConfig::default(), &solver);
    let outcome = pass.run(&mut graph, &mesh, &AliasSet::new(), None).unwrap();
    assert_eq!(
        outcome,
        PassOutcome::Sharded { objective: 0.0, reshards: 0, reduce_scatter_regions: 0 }
    );
    assert!(graph.fully_annotated());
}

// ── Preservation Mode ──────────────────────────────────────────

#[test]
fn test_annotation_trims_candidates_and_stashes_the_rest() {
    let mesh = mesh_1x4();
    let graph = validated(vec![
        annotated_param("p", vec![64, 64], Sharding::split(2, 0, 0)),
        unary("neg", vec![64, 64], 0),
    ]);
    let config = AutoShardingConfig::default();

    let (arena, mut stash) = enumerate_strategies(&graph, &mesh, &config).unwrap();
    let leaf = arena.leaf(arena.node_group(0));
    assert_eq!(leaf.strategies.len(), 1);
    assert_eq!(leaf.strategies[0].output_sharding, Sharding::split(2, 0, 0));
    // The full set (two 1-D tilings plus replication) is stashed.
    assert!(stash.contains(0));
    assert_eq!(stash.restore(0).unwrap().len(), 3);
    assert!(!stash.contains(1));
    // The mirror shrinks with its source.
    assert_eq!(arena.leaf(arena.node_group(1)).strategies.len(), 1);
}

#[test]
fn test_repair_inserts_one_reshard_and_is_idempotent() {
    let mesh = mesh_1x4();
    let mut graph = validated(vec![
        annotated_param("p0", vec![64, 64], Sharding::split(2, 0, 0)),
        annotated_param("p1", vec![64, 64], Sharding::split(2, 1, 0)),
        NodeDef::new("add", OpKind::Elementwise, Shape::matrix(64, 64), DType::F32, vec![0, 1]),
    ]);
    let config = AutoShardingConfig::default();

    let (arena, _) = enumerate_strategies(&graph, &mesh, &config).unwrap();
    let cost_graph = CostGraph::build(&graph, &arena, &AliasSet::new(), &mesh);
    let liveness = LivenessSchedule::from_def_use(&graph);
    let request = build_request(&graph, &arena, &cost_graph, &liveness, &config).unwrap();
    let response = ExhaustiveSolver::new().solve(&request).unwrap();
    let SolverResponse::Solution { chosen, objective } = response else {
        panic!("expected a solution");
    };
    // Best choice keeps p0's layout and re-tiles p1: one all-to-all on
    // a 4 KB shard, 1 + (3/4)*4096.
    assert_eq!(objective, 3073.0);

    let leaf_chosen = cost_graph.expand_solution(&chosen);
    set_shardings(&mut graph, &arena, &mesh, &leaf_chosen, false);
    set_shardings(&mut graph, &arena, &mesh, &leaf_chosen, true);
    assert_eq!(leaf_ann(&graph, 2), Sharding::split(2, 0, 0));

    let env = ClusterEnv::new(&mesh);
    let inserted = repair_reshards(&mut graph, &arena, &env, &leaf_chosen).unwrap();
    assert_eq!(inserted, 1);
    assert_eq!(graph.num_nodes(), 4);
    assert_eq!(graph.node(3).unwrap().kind, OpKind::Reshard);
    assert_eq!(graph.node(3).unwrap().operands, vec![1]);
    assert_eq!(graph.node(2).unwrap().operands, vec![0, 3]);
    assert_eq!(leaf_ann(&graph, 3), Sharding::split(2, 0, 0));

    // A second repair finds the copy already in place.
    let inserted = repair_reshards(&mut graph, &arena, &env, &leaf_chosen).unwrap();
    assert_eq!(inserted, 0);
    assert_eq!(graph.num_nodes(), 4);
}

// ── Reduce-Scatter Rewrite ─────────────────────────────────────

/// Contracted-dimension inputs, a partial-sum dot, and a run of
/// elementwise users ending in a reduction.
fn partial_sum_graph() -> OpGraph<Validated> {
    validated(vec![
        annotated_param("lhs", vec![64, 128], Sharding::split(2, 1, 0)),
        annotated_param("rhs", vec![128, 32], Sharding::split(2, 0, 0)),
        NodeDef::new(
            "dot",
            OpKind::Dot { lhs_contracting: 1, rhs_contracting: 0 },
            Shape::matrix(64, 32),
            DType::F32,
            vec![0, 1],
        ),
        unary("e1", vec![64, 32], 2),
        unary("e2", vec![64, 32], 3),
        unary("e3", vec![64, 32], 4),
        NodeDef::new(
            "sum",
            OpKind::Reduce { dims: vec![0] },
            Shape::vector(32),
            DType::F32,
            vec![5],
        ),
    ])
}

#[test]
fn test_rewrite_scatters_region_and_gathers_at_boundary() {
    let mesh = mesh_1x4();
    let mut graph = partial_sum_graph();

    let outcome = run_pass(&mut graph, &mesh, AutoShardingConfig::default());
    let PassOutcome::Sharded { objective, reshards, reduce_scatter_regions } = outcome
    else {
        panic!("expected a sharded graph");
    };
    // The annotated inputs make the contracted split free on both
    // operands; only the dot's all-reduce is paid:
    // 1 + 2*(3/4)*8192 = 12289.
    assert_eq!(objective, 12289.0);
    assert_eq!(reshards, 0);
    assert_eq!(reduce_scatter_regions, 1);

    // The dot and its elementwise users now compute on scattered rows.
    let scattered = Sharding::split(2, 0, 0);
    for i in 2..=5 {
        assert_eq!(leaf_ann(&graph, i), scattered);
    }
    // The reduction sits outside the region: an all-gather restores
    // the replicated layout at the single boundary.
    assert_eq!(graph.num_nodes(), 8);
    assert_eq!(
        graph.node(7).unwrap().kind,
        OpKind::AllGather { mesh_axes: vec![0] }
    );
    assert_eq!(graph.node(7).unwrap().operands, vec![5]);
    assert_eq!(graph.node(6).unwrap().operands, vec![7]);
    assert_eq!(leaf_ann(&graph, 7), Sharding::Replicated);
    assert_eq!(leaf_ann(&graph, 6), Sharding::Replicated);
}

#[test]
fn test_rewrite_collects_elementwise_producers() {
    let mesh = mesh_1x4();
    // A replicated side chain q → y feeds the region through e2: the
    // upstream walk pulls y in, so its work is divided too.
    let mut graph = validated(vec![
        annotated_param("lhs", vec![64, 128], Sharding::split(2, 1, 0)),
        annotated_param("rhs", vec![128, 32], Sharding::split(2, 0, 0)),
        annotated_param("q", vec![64, 32], Sharding::Replicated),
        NodeDef::new(
            "dot",
            OpKind::Dot { lhs_contracting: 1, rhs_contracting: 0 },
            Shape::matrix(64, 32),
            DType::F32,
            vec![0, 1],
        ),
        unary("y", vec![64, 32], 2),
        unary("e1", vec![64, 32], 3),
        NodeDef::new("e2", OpKind::Elementwise, Shape::matrix(64, 32), DType::F32, vec![5, 4]),
        NodeDef::new(
            "sum",
            OpKind::Reduce { dims: vec![0] },
            Shape::vector(32),
            DType::F32,
            vec![6],
        ),
    ]);

    let outcome = run_pass(&mut graph, &mesh, AutoShardingConfig::default());
    let PassOutcome::Sharded { reshards, reduce_scatter_regions, .. } = outcome else {
        panic!("expected a sharded graph");
    };
    assert_eq!(reshards, 0);
    assert_eq!(reduce_scatter_regions, 1);

    // dot, y, e1, e2 all compute on scattered rows; q stays whole and
    // is sliced locally by y.
    let scattered = Sharding::split(2, 0, 0);
    for i in 3..=6 {
        assert_eq!(leaf_ann(&graph, i), scattered);
    }
    assert_eq!(leaf_ann(&graph, 2), Sharding::Replicated);

    // Single boundary before the reduction.
    assert_eq!(graph.num_nodes(), 9);
    assert_eq!(
        graph.node(8).unwrap().kind,
        OpKind::AllGather { mesh_axes: vec![0] }
    );
    assert_eq!(graph.node(8).unwrap().operands, vec![6]);
    assert_eq!(graph.node(7).unwrap().operands, vec![8]);
}

#[test]
fn test_rewrite_respects_min_set() {
    let mesh = mesh_1x4();
    // Region is only {dot, e1}: below the default minimum of 3.
    let mut graph = validated(vec![
        annotated_param("lhs", vec![64, 128], Sharding::split(2, 1, 0)),
        annotated_param("rhs", vec![128, 32], Sharding::split(2, 0, 0)),
        NodeDef::new(
            "dot",
            OpKind::Dot { lhs_contracting: 1, rhs_contracting: 0 },
            Shape::matrix(64, 32),
            DType::F32,
            vec![0, 1],
        ),
        unary("e1", vec![64, 32], 2),
    ]);

    let outcome = run_pass(&mut graph, &mesh, AutoShardingConfig::default());
    let PassOutcome::Sharded { reduce_scatter_regions, .. } = outcome else {
        panic!("expected a sharded graph");
    };
    assert_eq!(reduce_scatter_regions, 0);
    assert_eq!(leaf_ann(&graph, 2), Sharding::Replicated);
}

#[test]
fn test_rewrite_is_idempotent() {
    let mesh = mesh_1x4();
    let mut graph = partial_sum_graph();
    let config = AutoShardingConfig::default();

    let (arena, _) = enumerate_strategies(&graph, &mesh, &config).unwrap();
    let cost_graph = CostGraph::build(&graph, &arena, &AliasSet::new(), &mesh);
    let liveness = LivenessSchedule::from_def_use(&graph);
    let request = build_request(&graph, &arena, &cost_graph, &liveness, &config).unwrap();
    let SolverResponse::Solution { chosen, .. } =
        ExhaustiveSolver::new().solve(&request).unwrap()
    else {
        panic!("expected a solution");
    };
    let leaf_chosen = cost_graph.expand_solution(&chosen);
    set_shardings(&mut graph, &arena, &mesh, &leaf_chosen, false);
    set_shardings(&mut graph, &arena, &mesh, &leaf_chosen, true);

    let env = ClusterEnv::new(&mesh);
    let first =
        rewrite_reduce_scatter(&mut graph, &arena, &env, &leaf_chosen, &config).unwrap();
    assert_eq!(first, 1);
    let nodes_after_first = graph.num_nodes();

    // The region's annotations no longer match the chosen candidate's
    // output, so a second run finds nothing to rewrite.
    let second =
        rewrite_reduce_scatter(&mut graph, &arena, &env, &leaf_chosen, &config).unwrap();
    assert_eq!(second, 0);
    assert_eq!(graph.num_nodes(), nodes_after_first);
}

#[test]
fn test_rewrite_can_be_disabled() {
    let mesh = mesh_1x4();
    let mut graph = partial_sum_graph();
    let config = AutoShardingConfig {
        enable_reduce_scatter: false,
        ..AutoShardingConfig::default()
    };

    let outcome = run_pass(&mut graph, &mesh, config);
    let PassOutcome::Sharded { reduce_scatter_regions, .. } = outcome else {
        panic!("expected a sharded graph");
    };
    assert_eq!(reduce_scatter_regions, 0);
    // The partial sums are still discharged by a plain all-reduce.
    assert_eq!(leaf_ann(&graph, 2), Sharding::Replicated);
    assert_eq!(graph.num_nodes(), 7);
}
