//! UI node tree returned by generated components, plus the text renderer.
//!
//! A component render yields a Luau table tree built from the registry's
//! constructors. The tree is converted into [`UiNode`] for the host;
//! event handler functions are collected into a side list and referenced
//! by index, so the displayed tree stays plain data.

use mlua::{Function, Table, Value};
use thiserror::Error;

/// Index into [`RenderedTree::handlers`].
pub type HandlerId = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum UiNode {
    Column(Vec<UiNode>),
    Row(Vec<UiNode>),
    Text { content: String, emphasis: bool },
    Button { label: String, on_press: Option<HandlerId> },
    Input {
        value: String,
        placeholder: String,
        on_change: Option<HandlerId>,
    },
    Progress { value: f64, label: Option<String> },
    Divider,
    Spacer,
}

/// One render's output: the displayable tree plus its live handlers.
#[derive(Debug)]
pub struct RenderedTree {
    pub root: UiNode,
    pub handlers: Vec<Function>,
}

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("component returned {0}, expected a ui node table")]
    NotANode(&'static str),
    #[error("unknown ui node kind '{0}'")]
    UnknownKind(String),
    #[error("malformed ui node: {0}")]
    Malformed(String),
}

impl From<mlua::Error> for TreeError {
    fn from(e: mlua::Error) -> Self {
        TreeError::Malformed(e.to_string())
    }
}

impl UiNode {
    /// Converts a Luau value into a node, pushing any handler functions
    /// onto `handlers`.
    pub fn from_value(value: &Value, handlers: &mut Vec<Function>) -> Result<UiNode, TreeError> {
        let table = match value {
            Value::Table(t) => t,
            other => return Err(TreeError::NotANode(other.type_name())),
        };
        let kind: String = table.get("kind")?;
        match kind.as_str() {
            "column" => Ok(UiNode::Column(children(table, handlers)?)),
            "row" => Ok(UiNode::Row(children(table, handlers)?)),
            "text" => Ok(UiNode::Text {
                content: table.get("content")?,
                emphasis: table.get::<Option<bool>>("emphasis")?.unwrap_or(false),
            }),
            "button" => Ok(UiNode::Button {
                label: table.get("label")?,
                on_press: push_handler(table.get::<Option<Function>>("on_press")?, handlers),
            }),
            "input" => Ok(UiNode::Input {
                value: table.get::<Option<String>>("value")?.unwrap_or_default(),
                placeholder: table
                    .get::<Option<String>>("placeholder")?
                    .unwrap_or_default(),
                on_change: push_handler(table.get::<Option<Function>>("on_change")?, handlers),
            }),
            "progress" => Ok(UiNode::Progress {
                value: table.get::<f64>("value")?.clamp(0.0, 1.0),
                label: table.get::<Option<String>>("label")?,
            }),
            "divider" => Ok(UiNode::Divider),
            "spacer" => Ok(UiNode::Spacer),
            other => Err(TreeError::UnknownKind(other.to_string())),
        }
    }
}

fn children(table: &Table, handlers: &mut Vec<Function>) -> Result<Vec<UiNode>, TreeError> {
    let list: Table = table.get("children")?;
    let mut nodes = Vec::new();
    for child in list.sequence_values::<Value>() {
        nodes.push(UiNode::from_value(&child?, handlers)?);
    }
    Ok(nodes)
}

fn push_handler(f: Option<Function>, handlers: &mut Vec<Function>) -> Option<HandlerId> {
    f.map(|func| {
        handlers.push(func);
        handlers.len() - 1
    })
}

/// Renders a node tree as plain text. Interactive elements show their
/// handler number so the host can route `tap N` / `type N ...` commands.
pub fn render_to_text(node: &UiNode) -> String {
    let mut lines = Vec::new();
    render_node(node, &mut lines);
    lines.join("\n")
}

fn render_node(node: &UiNode, lines: &mut Vec<String>) {
    match node {
        UiNode::Column(children) => {
            for child in children {
                render_node(child, lines);
            }
        }
        UiNode::Row(children) => {
            let mut cells = Vec::new();
            for child in children {
                let mut sub = Vec::new();
                render_node(child, &mut sub);
                cells.push(sub.join(" "));
            }
            lines.push(cells.join("   "));
        }
        UiNode::Text { content, emphasis } => {
            if *emphasis {
                lines.push(format!("== {content} =="));
            } else {
                lines.push(content.clone());
            }
        }
        UiNode::Button { label, on_press } => match on_press {
            Some(id) => lines.push(format!("[{}] {label}", id + 1)),
            None => lines.push(format!("( {label} )")),
        },
        UiNode::Input {
            value,
            placeholder,
            on_change,
        } => {
            let shown = if value.is_empty() { placeholder } else { value };
            match on_change {
                Some(id) => lines.push(format!("[{}] <{shown}>", id + 1)),
                None => lines.push(format!("<{shown}>")),
            }
        }
        UiNode::Progress { value, label } => {
            let filled = (value * 20.0).round() as usize;
            let bar: String = "#".repeat(filled) + &"-".repeat(20 - filled.min(20));
            let pct = (value * 100.0).round() as i64;
            match label {
                Some(l) => lines.push(format!("[{bar}] {pct}% {l}")),
                None => lines.push(format!("[{bar}] {pct}%")),
            }
        }
        UiNode::Divider => lines.push("─".repeat(40)),
        UiNode::Spacer => lines.push(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlua::Lua;

    #[test]
    fn test_render_numbered_interactives() {
        let tree = UiNode::Column(vec![
            UiNode::Text {
                content: "Counter".to_string(),
                emphasis: true,
            },
            UiNode::Button {
                label: "Increment".to_string(),
                on_press: Some(0),
            },
            UiNode::Input {
                value: String::new(),
                placeholder: "amount".to_string(),
                on_change: Some(1),
            },
        ]);
        let out = render_to_text(&tree);
        assert_eq!(out, "== Counter ==\n[1] Increment\n[2] <amount>");
    }

    #[test]
    fn test_render_progress_bar() {
        let node = UiNode::Progress {
            value: 0.5,
            label: None,
        };
        assert_eq!(render_to_text(&node), "[##########----------] 50%");
    }

    #[test]
    fn test_from_value_collects_handlers() {
        let lua = Lua::new();
        let on_press: Function = lua.load("return function() end").eval().unwrap();
        let node = lua.create_table().unwrap();
        node.set("kind", "button").unwrap();
        node.set("label", "Go").unwrap();
        node.set("on_press", on_press).unwrap();

        let mut handlers = Vec::new();
        let parsed = UiNode::from_value(&Value::Table(node), &mut handlers).unwrap();
        assert_eq!(handlers.len(), 1);
        assert!(matches!(
            parsed,
            UiNode::Button {
                on_press: Some(0),
                ..
            }
        ));
    }

    #[test]
    fn test_from_value_rejects_non_table() {
        let mut handlers = Vec::new();
        let err = UiNode::from_value(&Value::Integer(7), &mut handlers).unwrap_err();
        assert!(matches!(err, TreeError::NotANode(_)));
    }

    #[test]
    fn test_from_value_rejects_unknown_kind() {
        let lua = Lua::new();
        let node = lua.create_table().unwrap();
        node.set("kind", "carousel").unwrap();
        let mut handlers = Vec::new();
        let err = UiNode::from_value(&Value::Table(node), &mut handlers).unwrap_err();
        assert!(matches!(err, TreeError::UnknownKind(k) if k == "carousel"));
    }
}
