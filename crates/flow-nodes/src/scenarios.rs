//! End-to-end tests over the built-in node kinds

use std::sync::Arc;

use flow_engine::{
    ColumnRef, Diagram, DiagramEditor, EngineConfig, EngineEvent, NodeId, Point, PortAddress, PropagationMode,
    Replayer, VecEventSink, NO_DATASET,
};
use serde_json::json;

use crate::tests::{five_rows, items, registry, source_with};
use crate::{ConstantsGenerator, DataReservoir, DataSource, DataTable, RangeFilter, ScriptEditor, SetUnion};

fn link(diagram: &mut Diagram, from: &str, from_port: &str, to: &str, to_port: &str) {
    diagram
        .connect(&PortAddress::output(from, from_port), &PortAddress::input(to, to_port))
        .unwrap();
}

/// Source, range filter on `value >= 3` and a data table
fn pipeline(diagram: &mut Diagram) -> (NodeId, NodeId, NodeId) {
    let source = source_with(diagram, five_rows());
    let filter = diagram.create_node(RangeFilter::NODE_TYPE).unwrap();
    diagram.set_node_option(&filter, "column", json!({"column": 0})).unwrap();
    diagram.set_node_option(&filter, "min", json!(3)).unwrap();
    let table = diagram.create_node(DataTable::NODE_TYPE).unwrap();
    link(diagram, &source, DataSource::PORT_OUT, &filter, RangeFilter::PORT_IN);
    link(diagram, &filter, RangeFilter::PORT_OUT, &table, DataTable::PORT_IN);
    (source, filter, table)
}

#[test]
fn test_pipeline_and_disconnect() {
    let mut diagram = Diagram::new(registry());
    let (source, filter, table) = pipeline(&mut diagram);
    assert_eq!(items(&diagram, &table, DataTable::PORT_OUT), vec![3, 4]);

    diagram
        .disconnect(
            &PortAddress::output(&source, DataSource::PORT_OUT),
            &PortAddress::input(&filter, RangeFilter::PORT_IN),
        )
        .unwrap();
    for node in [&filter, &table] {
        assert_eq!(diagram.node_state(node).unwrap().cover_text.as_deref(), Some(NO_DATASET));
    }
    assert!(diagram.output_package(&table, DataTable::PORT_OUT).is_none());
    assert!(diagram.output_package(&table, DataTable::PORT_SELECTION).is_none());
}

#[test]
fn test_option_undo_redo() {
    let mut editor = DiagramEditor::new(registry(), EngineConfig::default());
    let source = editor.create_node(DataSource::NODE_TYPE).unwrap();
    editor
        .set_node_option(&source, "dataset", serde_json::to_value(five_rows()).unwrap())
        .unwrap();
    let filter = editor.create_node(RangeFilter::NODE_TYPE).unwrap();
    editor
        .connect(
            &PortAddress::output(&source, DataSource::PORT_OUT),
            &PortAddress::input(&filter, RangeFilter::PORT_IN),
        )
        .unwrap();
    editor.set_node_option(&filter, "column", json!({"column": 0})).unwrap();
    editor.set_node_option(&filter, "min", json!(2)).unwrap();
    editor.set_node_option(&filter, "min", json!(3)).unwrap();
    assert_eq!(items(editor.diagram(), &filter, RangeFilter::PORT_OUT), vec![3, 4]);
    assert_eq!(editor.history().undo_message(), Some("set min"));

    assert!(editor.undo().unwrap());
    assert_eq!(items(editor.diagram(), &filter, RangeFilter::PORT_OUT), vec![2, 3, 4]);
    assert!(editor.undo().unwrap());
    assert_eq!(items(editor.diagram(), &filter, RangeFilter::PORT_OUT), vec![0, 1, 2, 3, 4]);
    assert_eq!(editor.diagram().option_value(&filter, "min").unwrap(), json!(null));

    assert!(editor.redo().unwrap());
    assert_eq!(items(editor.diagram(), &filter, RangeFilter::PORT_OUT), vec![2, 3, 4]);
    assert_eq!(editor.history().redo_message(), Some("set min"));
}

#[test]
fn test_double_toggle_cancels() {
    let mut editor = DiagramEditor::new(registry(), EngineConfig::default());
    let generator = editor.create_node(ConstantsGenerator::NODE_TYPE).unwrap();
    let depth = editor.history().undo_stack().len();

    editor.set_node_option(&generator, "sorted", json!(true)).unwrap();
    assert_eq!(editor.history().undo_stack().len(), depth + 1);
    editor.set_node_option(&generator, "sorted", json!(false)).unwrap();
    assert_eq!(editor.history().undo_stack().len(), depth);
    // Both toggles are still in the session log
    assert_eq!(editor.log().len(), depth + 2);
}

#[test]
fn test_replay_reproduces_session() {
    let mut editor = DiagramEditor::new(registry(), EngineConfig::default());
    let source = editor.create_node_at(DataSource::NODE_TYPE, Point::new(10.0, 10.0)).unwrap();
    editor
        .set_node_option(&source, "dataset", serde_json::to_value(five_rows()).unwrap())
        .unwrap();
    let filter = editor.create_node(RangeFilter::NODE_TYPE).unwrap();
    let table = editor.create_node(DataTable::NODE_TYPE).unwrap();
    editor
        .connect(
            &PortAddress::output(&source, DataSource::PORT_OUT),
            &PortAddress::input(&filter, RangeFilter::PORT_IN),
        )
        .unwrap();
    editor
        .connect(
            &PortAddress::output(&filter, RangeFilter::PORT_OUT),
            &PortAddress::input(&table, DataTable::PORT_IN),
        )
        .unwrap();
    editor.set_node_option(&filter, "column", json!({"column": 0})).unwrap();
    editor.set_node_option(&filter, "max", json!(1)).unwrap();
    editor.set_node_option(&table, "selection", json!([1])).unwrap();
    editor.move_node(&table, Point::new(300.0, 40.0)).unwrap();
    editor.undo().unwrap();
    editor.undo().unwrap();
    editor.redo().unwrap();
    editor.pan(5.0, -5.0);
    editor.remove_node(&filter).unwrap();
    editor.undo().unwrap();

    let expected = editor.save().to_json().unwrap();
    let mut replayer = Replayer::new(registry(), EngineConfig::default(), editor.log().to_vec()).unwrap();
    let replayed = replayer.replay_all().unwrap().serialize_diagram().to_json().unwrap();
    assert_eq!(replayed, expected);
}

#[test]
fn test_frozen_reservoir_stops_propagation() {
    let sink = Arc::new(VecEventSink::new());
    let mut diagram = Diagram::new(registry()).with_event_sink(sink.clone());
    let source = source_with(&mut diagram, five_rows());
    let reservoir = diagram.create_node(DataReservoir::NODE_TYPE).unwrap();
    let table = diagram.create_node(DataTable::NODE_TYPE).unwrap();
    link(&mut diagram, &source, DataSource::PORT_OUT, &reservoir, DataReservoir::PORT_IN);
    link(&mut diagram, &reservoir, DataReservoir::PORT_OUT, &table, DataTable::PORT_IN);
    diagram.set_node_option(&reservoir, "frozen", json!(true)).unwrap();

    sink.clear();
    diagram
        .set_node_option(&source, "dataset", serde_json::to_value(five_rows()).unwrap())
        .unwrap();
    assert_eq!(sink.update_count(&source), 1);
    assert_eq!(sink.update_count(&reservoir), 0);
    assert_eq!(sink.update_count(&table), 0);
}

#[test]
fn test_same_dataset_keeps_column() {
    let mut diagram = Diagram::new(registry());
    let (source, filter, _) = pipeline(&mut diagram);

    diagram
        .set_node_option(&source, "dataset", serde_json::to_value(five_rows()).unwrap())
        .unwrap();
    assert_eq!(
        diagram.node::<RangeFilter>(&filter).unwrap().column(),
        Some(ColumnRef::Column(0))
    );
}

/// Source feeding two filters that meet again at a union
fn diamond(config: EngineConfig) -> (Diagram, Arc<VecEventSink>, NodeId, NodeId) {
    let sink = Arc::new(VecEventSink::new());
    let mut diagram = Diagram::new(registry())
        .with_config(config)
        .with_event_sink(sink.clone());
    let source = source_with(&mut diagram, five_rows());
    let union = diagram.create_node(SetUnion::NODE_TYPE).unwrap();
    for _ in 0..2 {
        let filter = diagram.create_node(RangeFilter::NODE_TYPE).unwrap();
        link(&mut diagram, &source, DataSource::PORT_OUT, &filter, RangeFilter::PORT_IN);
        link(&mut diagram, &filter, RangeFilter::PORT_OUT, &union, SetUnion::PORT_IN);
    }
    sink.clear();
    (diagram, sink, source, union)
}

#[test]
fn test_diamond_update_counts() {
    let dataset = serde_json::to_value(five_rows()).unwrap();

    let (mut diagram, sink, source, union) = diamond(EngineConfig::default());
    diagram.set_node_option(&source, "dataset", dataset.clone()).unwrap();
    assert_eq!(sink.update_count(&union), 2);

    let config = EngineConfig::default().with_propagation(PropagationMode::Topological);
    let (mut diagram, sink, source, union) = diamond(config);
    diagram.set_node_option(&source, "dataset", dataset).unwrap();
    assert_eq!(sink.update_count(&union), 1);
    assert_eq!(items(&diagram, &union, SetUnion::PORT_OUT), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_script_failure_spares_sibling_branch() {
    let sink = Arc::new(VecEventSink::new());
    let mut diagram = Diagram::new(registry()).with_event_sink(sink.clone());
    let source = source_with(&mut diagram, five_rows());
    let script = diagram.create_node(ScriptEditor::NODE_TYPE).unwrap();
    diagram.set_node_option(&script, "path", json!("[9].name")).unwrap();
    let filter = diagram.create_node(RangeFilter::NODE_TYPE).unwrap();
    diagram.set_node_option(&filter, "column", json!({"column": 0})).unwrap();
    diagram.set_node_option(&filter, "min", json!(3)).unwrap();
    link(&mut diagram, &source, DataSource::PORT_OUT, &script, ScriptEditor::PORT_IN);
    link(&mut diagram, &source, DataSource::PORT_OUT, &filter, RangeFilter::PORT_IN);

    sink.clear();
    diagram
        .set_node_option(&source, "dataset", serde_json::to_value(five_rows()).unwrap())
        .unwrap();

    let events = sink.events();
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::NodeFailed { node_id, .. } if *node_id == script)));
    assert_eq!(sink.update_count(&filter), 1);
    assert_eq!(items(&diagram, &filter, RangeFilter::PORT_OUT), vec![3, 4]);
    assert!(diagram.node_state(&script).unwrap().error.is_some());
    assert!(diagram.node_state(&filter).unwrap().error.is_none());
}

#[test]
fn test_undo_upstream_change_keeps_cleared_selection() {
    let mut editor = DiagramEditor::new(registry(), EngineConfig::default());
    let source = editor.create_node(DataSource::NODE_TYPE).unwrap();
    editor
        .set_node_option(&source, "dataset", serde_json::to_value(five_rows()).unwrap())
        .unwrap();
    let table = editor.create_node(DataTable::NODE_TYPE).unwrap();
    editor
        .connect(
            &PortAddress::output(&source, DataSource::PORT_OUT),
            &PortAddress::input(&table, DataTable::PORT_IN),
        )
        .unwrap();
    editor.set_node_option(&table, "selection", json!([1, 3])).unwrap();

    let other = flow_engine::TabularDataset::from_rows(vec!["value"], vec![vec![7.0.into()], vec![8.0.into()]]);
    editor
        .set_node_option(&source, "dataset", serde_json::to_value(other).unwrap())
        .unwrap();
    assert_eq!(editor.diagram().option_value(&table, "selection").unwrap(), json!([]));

    // The reset is a side effect of the dataset change, not a history entry
    editor.undo().unwrap();
    assert_eq!(items(editor.diagram(), &table, DataTable::PORT_OUT), vec![0, 1, 2, 3, 4]);
    assert_eq!(editor.diagram().option_value(&table, "selection").unwrap(), json!([]));
    assert_eq!(editor.history().undo_message(), Some("set selection"));
}
