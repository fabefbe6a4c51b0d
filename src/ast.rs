use crate::error::{ParseError, Result};
use crate::strpool::StrRef;

/// Maximum number of children a single AST node may carry. Exceeding this is
/// a hard capacity error, not a silent truncation.
pub const AST_CHILDREN_MAX: usize = 10;

//===----------------------------------------------------------------------===//
// Node flags
//===----------------------------------------------------------------------===//

/// The node's children are an argument list plus a body and are not eagerly
/// walked; the node evaluates to a lambda reference where written.
pub const FLAG_LAMBDA: u8 = 0x01;
/// Short-circuit conditional: only one of the two branch children runs.
pub const FLAG_IF: u8 = 0x02;
/// Pushes a stack frame marker on first visit; discards intermediate child
/// values when it completes.
pub const FLAG_BEGIN: u8 = 0x04;
/// Leaf produced by a quoted string literal (kept so re-serialization can
/// restore the quotes).
pub const FLAG_STRING: u8 = 0x10;

//===----------------------------------------------------------------------===//
// AstNode
//===----------------------------------------------------------------------===//

/// One parsed S-expression position.
///
/// `token` is `None` for an operator node whose symbol has not arrived yet
/// (and stays `None` for lambda argument-list nodes). Children are ordered
/// and bounded by [`AST_CHILDREN_MAX`].
#[derive(Debug, Clone)]
pub struct AstNode {
    flags: u8,
    token: Option<StrRef>,
    parent: Option<usize>,
    children: Vec<usize>,
}

impl AstNode {
    pub fn token(&self) -> Option<StrRef> {
        self.token
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn children(&self) -> &[usize] {
        &self.children
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn is_lambda(&self) -> bool {
        self.flags & FLAG_LAMBDA != 0
    }

    pub fn is_if(&self) -> bool {
        self.flags & FLAG_IF != 0
    }

    pub fn is_begin(&self) -> bool {
        self.flags & FLAG_BEGIN != 0
    }

    pub fn is_string(&self) -> bool {
        self.flags & FLAG_STRING != 0
    }
}

//===----------------------------------------------------------------------===//
// Ast
//===----------------------------------------------------------------------===//

/// Arena of AST nodes addressed by index. Owned by the parser; read-only once
/// parsing completes.
#[derive(Debug, Default)]
pub struct Ast {
    nodes: Vec<AstNode>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: usize) -> &AstNode {
        &self.nodes[idx]
    }

    /// Appends a fresh empty node under `parent` (a root when `None`) and
    /// returns its index.
    pub(crate) fn add_child(&mut self, parent: Option<usize>) -> Result<usize> {
        let idx = self.nodes.len();
        if let Some(p) = parent {
            if self.nodes[p].children.len() >= AST_CHILDREN_MAX {
                return Err(ParseError::ChildCapacity { node: p }.into());
            }
            self.nodes[p].children.push(idx);
        }
        self.nodes.push(AstNode { flags: 0, token: None, parent, children: Vec::new() });
        Ok(idx)
    }

    pub(crate) fn set_token(&mut self, idx: usize, token: StrRef, flags: u8) {
        let node = &mut self.nodes[idx];
        node.token = Some(token);
        node.flags |= flags;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_attach_in_order() {
        let mut ast = Ast::new();
        let root = ast.add_child(None).unwrap();
        let a = ast.add_child(Some(root)).unwrap();
        let b = ast.add_child(Some(root)).unwrap();
        assert_eq!(ast.node(root).children(), &[a, b]);
        assert_eq!(ast.node(a).parent(), Some(root));
        assert_eq!(ast.node(b).parent(), Some(root));
    }

    #[test]
    fn child_capacity_is_enforced() {
        let mut ast = Ast::new();
        let root = ast.add_child(None).unwrap();
        for _ in 0..AST_CHILDREN_MAX {
            ast.add_child(Some(root)).unwrap();
        }
        let err = ast.add_child(Some(root)).unwrap_err();
        assert_eq!(
            err,
            crate::error::Error::Parse(ParseError::ChildCapacity { node: root })
        );
    }
}
