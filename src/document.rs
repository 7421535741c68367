//! Recursive traversal over JSON-like documents.
//!
//! A [`Document`] is a mapping, a sequence or a scalar. The walkers call an
//! operation on every node and only descend into a container when the
//! operation returns `true`.

use serde_json::Value;

pub type Document = Value;

/// Where a node sits inside its parent container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position<'a> {
    Root,
    Key(&'a str),
    Index(usize),
}

pub fn walk<'d, C, E, F>(
    position: Position<'d>,
    node: &'d Document,
    context: &mut C,
    operation: &mut F,
) -> Result<(), E>
where
    F: FnMut(Position<'d>, &'d Document, &mut C) -> Result<bool, E>,
{
    let descend = operation(position, node, context)?;
    if !descend {
        return Ok(());
    }

    match node {
        Value::Object(mapping) => {
            for (key, child) in mapping {
                walk(Position::Key(key), child, context, operation)?;
            }
        }
        Value::Array(sequence) => {
            for (index, child) in sequence.iter().enumerate() {
                walk(Position::Index(index), child, context, operation)?;
            }
        }
        _ => (),
    }

    return Ok(());
}

/// Mutable counterpart of [`walk`]. The operation may overwrite the node it is
/// handed, which replaces the parent's entry at `position`.
pub fn walk_mut<C, E, F>(
    position: Position<'_>,
    node: &mut Document,
    context: &mut C,
    operation: &mut F,
) -> Result<(), E>
where
    F: FnMut(Position<'_>, &mut Document, &mut C) -> Result<bool, E>,
{
    let descend = operation(position, node, context)?;
    if !descend {
        return Ok(());
    }

    match node {
        Value::Object(mapping) => {
            for (key, child) in mapping.iter_mut() {
                walk_mut(Position::Key(key), child, context, operation)?;
            }
        }
        Value::Array(sequence) => {
            for (index, child) in sequence.iter_mut().enumerate() {
                walk_mut(Position::Index(index), child, context, operation)?;
            }
        }
        _ => (),
    }

    return Ok(());
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use serde_json::json;

    use super::{walk, walk_mut, Document, Position};

    #[test]
    fn visits_every_node_in_order() {
        let document = json!({"a": [1, {"b": "c"}], "d": "e"});

        let mut visited: Vec<String> = vec![];
        walk(
            Position::Root,
            &document,
            &mut visited,
            &mut |position, node: &Document, visited: &mut Vec<String>| {
                visited.push(format!("{:?}={}", position, node));
                Ok::<bool, Infallible>(true)
            },
        )
        .unwrap();

        assert_eq!(
            visited,
            vec![
                r#"Root={"a":[1,{"b":"c"}],"d":"e"}"#,
                r#"Key("a")=[1,{"b":"c"}]"#,
                "Index(0)=1",
                r#"Index(1)={"b":"c"}"#,
                r#"Key("b")="c""#,
                r#"Key("d")="e""#,
            ]
        );
    }

    #[test]
    fn does_not_descend_when_operation_returns_false() {
        let document = json!({"stop": {"hidden": "x"}, "go": {"seen": "y"}});

        let mut count = 0;
        walk(
            Position::Root,
            &document,
            &mut count,
            &mut |position, _node: &Document, count: &mut i32| {
                *count += 1;
                Ok::<bool, Infallible>(position != Position::Key("stop"))
            },
        )
        .unwrap();

        // root, stop, go, seen
        assert_eq!(count, 4);
    }

    #[test]
    fn replaces_nodes_in_place() {
        let mut document = json!([{"foo": "mock id"}, {"bar": "baz"}, "mock id"]);

        walk_mut(
            Position::Root,
            &mut document,
            &mut (),
            &mut |_position, node: &mut Document, _: &mut ()| {
                if *node == "mock id" {
                    *node = json!("replaced");
                    return Ok::<bool, Infallible>(false);
                }
                Ok(true)
            },
        )
        .unwrap();

        assert_eq!(
            document,
            json!([{"foo": "replaced"}, {"bar": "baz"}, "replaced"])
        );
    }

    #[test]
    fn stops_on_first_error() {
        let mut document = json!({"a": 1, "b": 2, "c": 3});

        let mut seen = 0;
        let result = walk_mut(
            Position::Root,
            &mut document,
            &mut seen,
            &mut |position, _node: &mut Document, seen: &mut i32| {
                *seen += 1;
                match position {
                    Position::Key("b") => Err("boom"),
                    _ => Ok(true),
                }
            },
        );

        assert_eq!(result, Err("boom"));
        assert_eq!(seen, 3);
    }
}
