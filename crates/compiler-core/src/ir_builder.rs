//! Surface-IR lowering (spec §10.4 ambient boundary).
//!
//! The surface-syntax parser is an external collaborator (spec.md §1/§6);
//! this crate never lexes or parses source text. To exercise the pipeline
//! end-to-end without inventing a parser, the CLI and test suite drive a
//! JSON "surface IR" document describing a Node tree directly:
//! `{"kind": "...", "payload": ..., "bits": [...], "children": [...]}`.
//! This module lowers that document into the arena via repeated `alloc`
//! calls, populating C1/C2/C3 the way a real parser collaborator would -
//! a direct structural translation, not a language frontend.

use std::collections::HashMap;
use std::str::FromStr;

use compiler_error::{Error, ErrorKind, Result};
use serde::Deserialize;

use crate::annotations::{AnnotationFlags, AnnotationRecord};
use crate::arena::Arena;
use crate::context::CompileCtxt;
use crate::ids::NodeId;
use crate::node::{Node, NodeBits, NodeKind, Payload};
use crate::sourcemap::{FileId, SourceRef};

/// One JSON surface-IR node, as emitted by a parser collaborator or
/// hand-authored as a test fixture.
#[derive(Debug, Deserialize)]
pub struct SurfaceIrNode {
    pub kind: String,
    #[serde(default)]
    pub payload: Option<SurfacePayload>,
    #[serde(default)]
    pub bits: Vec<String>,
    #[serde(default)]
    pub children: Vec<SurfaceIrNode>,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub length: u32,
    #[serde(default)]
    pub annotation: Option<SurfaceAnnotation>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SurfacePayload {
    Str(String),
    Num(f64),
}

#[derive(Debug, Deserialize, Default)]
pub struct SurfaceAnnotation {
    #[serde(default)]
    pub raw: Option<String>,
    #[serde(default)]
    pub is_const: bool,
    #[serde(default)]
    pub no_collapse: bool,
    #[serde(default)]
    pub is_deprecated: bool,
    #[serde(default)]
    pub is_struct: bool,
    #[serde(default)]
    pub is_dict: bool,
    #[serde(default)]
    pub is_constructor: bool,
    #[serde(default)]
    pub is_interface: bool,
    #[serde(default)]
    pub is_enum: bool,
    #[serde(default)]
    pub is_exported: bool,
}

/// Lowers a single file's surface-IR document (its top-level `SCRIPT`
/// node) into `cc`'s arena, recording a `FileId` in the source map for
/// every node and registering any annotation it carries. Returns the
/// allocated `SCRIPT` NodeId.
pub fn lower_script(cc: &mut CompileCtxt, file_name: &str, doc: &SurfaceIrNode) -> Result<NodeId> {
    if doc.kind != "script" {
        return Err(Error::new(
            ErrorKind::SurfaceIrInvalid,
            format!("top-level surface-IR node must be kind 'script', got '{}'", doc.kind),
        )
        .with_operation("ir_builder::lower_script"));
    }
    let file = cc.source_map.add_file(file_name);
    lower_node(cc, file, doc)
}

fn lower_node(cc: &mut CompileCtxt, file: FileId, src: &SurfaceIrNode) -> Result<NodeId> {
    let kind = NodeKind::from_str(&src.kind).map_err(|_| {
        Error::new(
            ErrorKind::SurfaceIrInvalid,
            format!("unknown surface-IR node kind '{}'", src.kind),
        )
        .with_operation("ir_builder::lower_node")
    })?;

    let children = src
        .children
        .iter()
        .map(|c| lower_node(cc, file, c))
        .collect::<Result<Vec<_>>>()?;

    let mut node = Node::new(kind).with_children(children);
    node.payload = match &src.payload {
        Some(SurfacePayload::Str(s)) => Payload::Str(s.clone()),
        Some(SurfacePayload::Num(n)) => Payload::Num(*n),
        None => Payload::None,
    };
    node.bits = parse_bits(&src.bits)?;

    let id = cc.arena.alloc(node)?;
    cc.source_map.set(
        id,
        SourceRef {
            file,
            offset: src.offset,
            length: src.length,
        },
    );
    if let Some(ann) = &src.annotation {
        cc.annotations.set(
            id,
            AnnotationRecord {
                raw: ann.raw.clone(),
                flags: AnnotationFlags {
                    is_const: ann.is_const,
                    no_collapse: ann.no_collapse,
                    is_deprecated: ann.is_deprecated,
                    is_struct: ann.is_struct,
                    is_dict: ann.is_dict,
                    is_constructor: ann.is_constructor,
                    is_interface: ann.is_interface,
                    is_enum: ann.is_enum,
                    is_exported: ann.is_exported,
                },
            },
        );
    }
    Ok(id)
}

fn parse_bits(names: &[String]) -> Result<NodeBits> {
    let mut bits = NodeBits::default();
    for name in names {
        match name.as_str() {
            "is_synthetic" => bits.is_synthetic = true,
            "is_const_name" => bits.is_const_name = true,
            "is_arrow" => bits.is_arrow = true,
            "is_static_member" => bits.is_static_member = true,
            "is_generator" => bits.is_generator = true,
            "is_async" => bits.is_async = true,
            "is_computed_key" => bits.is_computed_key = true,
            "is_optional_chain_link" => bits.is_optional_chain_link = true,
            "is_class_field" => bits.is_class_field = true,
            "is_accessor" => bits.is_accessor = true,
            other => {
                return Err(Error::new(
                    ErrorKind::SurfaceIrInvalid,
                    format!("unknown node bit '{other}'"),
                )
                .with_operation("ir_builder::parse_bits"));
            }
        }
    }
    Ok(bits)
}

/// Lowers a whole program: every `(file_name, document)` pair becomes a
/// `SCRIPT` child of a freshly allocated synthetic `ROOT`, which becomes
/// the arena's root (data model §3 invariant 4: "a SCRIPT node appears
/// only as a direct child of ROOT").
pub fn lower_program(cc: &mut CompileCtxt, files: &[(String, SurfaceIrNode)]) -> Result<NodeId> {
    let scripts = files
        .iter()
        .map(|(name, doc)| lower_script(cc, name, doc))
        .collect::<Result<Vec<_>>>()?;
    let root = cc.arena.alloc(Node::new(NodeKind::Root).with_children(scripts))?;
    cc.arena.set_root(root);
    Ok(root)
}

/// Parses a surface-IR JSON document from text.
pub fn parse_surface_ir(text: &str) -> Result<SurfaceIrNode> {
    serde_json::from_str(text).map_err(|e| {
        Error::new(ErrorKind::SurfaceIrInvalid, e.to_string())
            .with_operation("ir_builder::parse_surface_ir")
    })
}

/// Convenience: NodeId -> debug label map, useful for golden-file tests
/// that want to assert on kind/payload shape without caring about exact
/// ids.
pub fn debug_labels(arena: &Arena, root: NodeId) -> Result<HashMap<NodeId, String>> {
    use crate::visit::{Descent, Visitor, walk};

    struct Labeler<'a> {
        arena: &'a Arena,
        labels: HashMap<NodeId, String>,
    }
    impl Visitor for Labeler<'_> {
        fn enter(&mut self, arena: &Arena, id: NodeId) -> Result<Descent> {
            let node = arena.get(id)?;
            let label = match node.payload.as_str() {
                Some(s) => format!("{}({s})", node.kind),
                None => node.kind.to_string(),
            };
            self.labels.insert(id, label);
            Ok(Descent::Continue)
        }
    }
    let mut labeler = Labeler {
        arena,
        labels: HashMap::new(),
    };
    walk(arena, root, &mut labeler)?;
    Ok(labeler.labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CompilerOptions;
    use pretty_assertions::assert_eq;

    #[test]
    fn lowers_a_simple_script_and_records_source_refs() {
        let json = r#"{
            "kind": "script",
            "offset": 0, "length": 10,
            "children": [
                {"kind": "number_lit", "payload": 1.0, "offset": 0, "length": 1}
            ]
        }"#;
        let doc = parse_surface_ir(json).unwrap();
        let mut cc = CompileCtxt::new(CompilerOptions::default());
        let script = lower_script(&mut cc, "a.js", &doc).unwrap();
        assert_eq!(cc.arena.get(script).unwrap().kind, NodeKind::Script);
        let child = cc.arena.get(script).unwrap().children[0];
        assert_eq!(cc.arena.get(child).unwrap().payload.as_num(), Some(1.0));
        assert_eq!(cc.source_map.get(child).unwrap().length, 1);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let json = r#"{"kind": "not_a_real_kind"}"#;
        let doc = parse_surface_ir(json).unwrap();
        let mut cc = CompileCtxt::new(CompilerOptions::default());
        let err = lower_script(&mut cc, "a.js", &doc).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SurfaceIrInvalid);
    }

    #[test]
    fn lower_program_nests_every_script_under_a_synthetic_root() {
        let a = parse_surface_ir(r#"{"kind": "script", "children": []}"#).unwrap();
        let b = parse_surface_ir(r#"{"kind": "script", "children": []}"#).unwrap();
        let mut cc = CompileCtxt::new(CompilerOptions::default());
        let root = lower_program(&mut cc, &[("a.js".into(), a), ("b.js".into(), b)]).unwrap();
        assert_eq!(cc.arena.get(root).unwrap().kind, NodeKind::Root);
        assert_eq!(cc.arena.get(root).unwrap().children.len(), 2);
        assert_eq!(cc.arena.root(), Some(root));
    }

    #[test]
    fn bits_are_parsed_onto_the_node() {
        let json = r#"{"kind": "arrow_function", "bits": ["is_arrow", "is_async"], "children": []}"#;
        let doc = parse_surface_ir(json).unwrap();
        let mut cc = CompileCtxt::new(CompilerOptions::default());
        let id = lower_script(
            &mut cc,
            "a.js",
            &parse_surface_ir(r#"{"kind": "script", "children": []}"#).unwrap(),
        )
        .unwrap();
        let _ = id;
        let node = lower_node(&mut cc, FileId(0), &doc).unwrap();
        let n = cc.arena.get(node).unwrap();
        assert!(n.bits.is_arrow);
        assert!(n.bits.is_async);
    }
}
