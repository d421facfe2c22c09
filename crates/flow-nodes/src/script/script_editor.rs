//! Script Editor
//!
//! Evaluates a user-authored path expression against the input rows.

use flow_engine::{
    check_dataset, option_from_value, ColumnRef, DatasetCapability, FlowError, Node, NodeCategory, NodeContext,
    NodeDescriptor, NodeKind, PortDataType, PortMetadata, Result, SubsetPackage, TabularDataset,
};
use serde_json::{json, Map, Value};

/// Script Editor
///
/// The input rows are rendered as `[{column: value}]` and the path selects
/// into that array: `[0].name`, `[2]`, or empty for every row. A path that
/// is malformed or matches nothing is reported as a script error on the
/// node.
///
/// # Inputs
/// - `in` (required) - subset to render
///
/// # Options
/// - `path` - path expression
///
/// # Outputs
/// - `out` (multiple) - the selected JSON value
pub struct ScriptEditor {
    capability: DatasetCapability,
    path: String,
}

impl ScriptEditor {
    pub const NODE_TYPE: &'static str = "script-editor";
    /// Port ID for the subset input
    pub const PORT_IN: &'static str = "in";
    /// Port ID for the selected value
    pub const PORT_OUT: &'static str = "out";

    pub fn new() -> Self {
        Self {
            capability: DatasetCapability::new(&[Self::PORT_IN]),
            path: String::new(),
        }
    }
}

impl Default for ScriptEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeKind for ScriptEditor {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new(Self::NODE_TYPE, NodeCategory::Script, "Script Editor")
            .with_description("Selects a value from the input rows with a path expression")
            .with_input(PortMetadata::required(Self::PORT_IN, "In", PortDataType::Subset))
            .with_output(PortMetadata::optional(Self::PORT_OUT, "Out", PortDataType::Json).multiple())
            .data_mutated()
    }
}

inventory::submit!(flow_engine::NodeTypeFn {
    descriptor: ScriptEditor::descriptor,
    create: || Box::new(ScriptEditor::new()),
});

/// Included rows as an array of `{column name: value}` objects
fn render_rows(dataset: &TabularDataset, input: &SubsetPackage) -> Value {
    let rows = input
        .item_indices()
        .into_iter()
        .map(|row| {
            let object: Map<String, Value> = dataset
                .columns()
                .iter()
                .filter_map(|column| {
                    let cell = dataset.cell(row, ColumnRef::Column(column.index))?;
                    Some((column.name.clone(), json!(cell)))
                })
                .collect();
            Value::Object(object)
        })
        .collect();
    Value::Array(rows)
}

/// Follow a path like `[0].user.name` into a JSON value
fn extract_path(json: &Value, path: &str) -> std::result::Result<Value, String> {
    let mut current = json;
    let mut remaining = path;

    while !remaining.is_empty() {
        if let Some(rest) = remaining.strip_prefix('[') {
            let end = rest
                .find(']')
                .ok_or_else(|| format!("unclosed '[' in path '{}'", path))?;
            let index: usize = rest[..end]
                .parse()
                .map_err(|_| format!("invalid index '{}' in path '{}'", &rest[..end], path))?;
            current = current
                .get(index)
                .ok_or_else(|| format!("index {} out of range in path '{}'", index, path))?;
            let rest = &rest[end + 1..];
            remaining = rest.strip_prefix('.').unwrap_or(rest);
            continue;
        }

        let split = remaining.find(['.', '[']).unwrap_or(remaining.len());
        let field = &remaining[..split];
        if field.is_empty() {
            return Err(format!("empty field name in path '{}'", path));
        }
        current = current
            .get(field)
            .ok_or_else(|| format!("no field '{}' in path '{}'", field, path))?;
        let rest = &remaining[split..];
        remaining = rest.strip_prefix('.').unwrap_or(rest);
    }

    Ok(current.clone())
}

impl Node for ScriptEditor {
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        let Some(dataset) = check_dataset(self, ctx) else {
            return Ok(());
        };
        let Some(input) = ctx.subset_input(Self::PORT_IN) else {
            return Ok(());
        };
        let rows = render_rows(&dataset, input);
        let value = extract_path(&rows, self.path.trim())
            .map_err(|message| FlowError::user_script(ctx.node_id(), message))?;
        ctx.update_output(Self::PORT_OUT, value);
        Ok(())
    }

    fn dataset_capability(&self) -> Option<&DatasetCapability> {
        Some(&self.capability)
    }

    fn dataset_capability_mut(&mut self) -> Option<&mut DatasetCapability> {
        Some(&mut self.capability)
    }

    fn serialize_options(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("path".to_string(), json!(self.path));
        map
    }

    fn set_option(&mut self, option: &str, value: Value) -> Result<()> {
        match option {
            "path" => self.path = option_from_value(option, value)?,
            _ => return Err(FlowError::unknown_option(Self::NODE_TYPE, option)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::DataSource;
    use crate::tests::{five_rows, registry, source_with};
    use flow_engine::{Diagram, NodeId, PortAddress};

    fn script(diagram: &mut Diagram) -> NodeId {
        let source = source_with(diagram, five_rows());
        let script = diagram.create_node(ScriptEditor::NODE_TYPE).unwrap();
        diagram
            .connect(
                &PortAddress::output(&source, DataSource::PORT_OUT),
                &PortAddress::input(&script, ScriptEditor::PORT_IN),
            )
            .unwrap();
        script
    }

    #[test]
    fn test_descriptor() {
        let meta = ScriptEditor::descriptor();
        assert_eq!(meta.node_type, "script-editor");
        assert_eq!(meta.category, NodeCategory::Script);
        assert!(meta.data_mutated);
        assert_eq!(meta.outputs[0].data_type, PortDataType::Json);
    }

    #[test]
    fn test_extract_path() {
        let value = json!({"users": [{"name": "a"}, {"name": "b", "tags": ["x"]}]});
        assert_eq!(extract_path(&value, "users[1].name"), Ok(json!("b")));
        assert_eq!(extract_path(&value, "users[1].tags[0]"), Ok(json!("x")));
        assert_eq!(extract_path(&value, ""), Ok(value.clone()));
        assert!(extract_path(&value, "users[9]").is_err());
        assert!(extract_path(&value, "users[x]").is_err());
        assert!(extract_path(&value, "users[0").is_err());
        assert!(extract_path(&value, "users..name").is_err());
    }

    #[test]
    fn test_selects_from_rows() {
        let mut diagram = Diagram::new(registry());
        let script = script(&mut diagram);
        assert_eq!(
            diagram.output_package(&script, ScriptEditor::PORT_OUT).and_then(|p| p.as_json()),
            Some(&json!([
                {"value": 0.0, "name": "row0"},
                {"value": 1.0, "name": "row1"},
                {"value": 2.0, "name": "row2"},
                {"value": 3.0, "name": "row3"},
                {"value": 4.0, "name": "row4"}
            ]))
        );

        diagram.set_node_option(&script, "path", json!("[1].name")).unwrap();
        assert_eq!(
            diagram.output_package(&script, ScriptEditor::PORT_OUT).and_then(|p| p.as_json()),
            Some(&json!("row1"))
        );
    }

    #[test]
    fn test_bad_path_is_reported_on_node() {
        let mut diagram = Diagram::new(registry());
        let script = script(&mut diagram);
        diagram.set_node_option(&script, "path", json!("[7].name")).unwrap();

        let state = diagram.node_state(&script).unwrap();
        assert_eq!(state.error.as_deref(), Some("index 7 out of range in path '[7].name'"));
        assert!(diagram.output_package(&script, ScriptEditor::PORT_OUT).is_none());

        diagram.set_node_option(&script, "path", json!("[0].value")).unwrap();
        assert!(diagram.node_state(&script).unwrap().error.is_none());
    }
}
