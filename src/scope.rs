//! Context tracker: lexical scope frames plus the markup/code region stack.
//!
//! Frames live in an arena (`Vec<ScopeFrame>`) and point at their parent by
//! index. Frame 0 is the component root and holds the declared parameters;
//! it is never popped. Lookups walk innermost to outermost.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ConversionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    Root,
    Loop,
    Conditional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BindingKind {
    Parameter,
    LoopItem,
    LoopIndex,
    Local,
}

/// The names a loop frame binds and the array field it iterates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopBinding {
    pub item: String,
    pub index: Option<String>,
    /// Key into `arrayFields`; `None` when the loop source is not a plain field.
    pub source_field: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeFrame {
    pub kind: FrameKind,
    pub bound_names: BTreeMap<String, BindingKind>,
    pub parent: Option<usize>,
    pub loop_binding: Option<LoopBinding>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Markup,
    Code,
}

#[derive(Debug, Clone)]
pub struct ContextTracker {
    component: String,
    frames: Vec<ScopeFrame>,
    regions: Vec<RegionKind>,
}

impl ContextTracker {
    pub fn new<I>(component: &str, parameters: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let bound_names = parameters
            .into_iter()
            .map(|name| (name, BindingKind::Parameter))
            .collect();
        Self {
            component: component.to_string(),
            frames: vec![ScopeFrame {
                kind: FrameKind::Root,
                bound_names,
                parent: None,
                loop_binding: None,
            }],
            regions: vec![RegionKind::Markup],
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Number of open frames, the root included.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn current(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn current_kind(&self) -> FrameKind {
        self.frames[self.current()].kind
    }

    /// Frames from innermost to outermost, following parent indices.
    fn chain(&self) -> impl Iterator<Item = &ScopeFrame> {
        std::iter::successors(Some(self.current()), move |&i| self.frames[i].parent)
            .map(move |i| &self.frames[i])
    }

    pub fn enter_scope(&mut self, kind: FrameKind, binding: Option<LoopBinding>) -> Result<usize> {
        if kind == FrameKind::Root {
            return Err(ConversionError::scope_imbalance(
                &self.component,
                "a root frame can only exist at the bottom of the stack",
            ));
        }
        let mut bound_names = BTreeMap::new();
        if let Some(binding) = &binding {
            bound_names.insert(binding.item.clone(), BindingKind::LoopItem);
            if let Some(index) = &binding.index {
                bound_names.insert(index.clone(), BindingKind::LoopIndex);
            }
        }
        let parent = Some(self.current());
        self.frames.push(ScopeFrame {
            kind,
            bound_names,
            parent,
            loop_binding: binding,
        });
        tracing::trace!(component = %self.component, ?kind, depth = self.depth(), "enter scope");
        Ok(self.current())
    }

    pub fn exit_scope(&mut self) -> Result<FrameKind> {
        if self.frames.len() <= 1 {
            return Err(ConversionError::scope_imbalance(
                &self.component,
                "scope exit without a matching enter (only the root frame is open)",
            ));
        }
        let frame = self.frames.pop().map(|f| f.kind).unwrap_or(FrameKind::Root);
        tracing::trace!(component = %self.component, kind = ?frame, depth = self.depth(), "exit scope");
        Ok(frame)
    }

    /// Pops the current frame, failing unless it is of `kind`.
    pub fn exit_scope_of(&mut self, kind: FrameKind) -> Result<()> {
        let current = self.current_kind();
        if current != kind {
            return Err(ConversionError::scope_imbalance(
                &self.component,
                format!("expected to close a {:?} frame but the open frame is {:?}", kind, current),
            ));
        }
        self.exit_scope().map(|_| ())
    }

    pub fn bind_name(&mut self, name: &str, kind: BindingKind) {
        let current = self.current();
        self.frames[current].bound_names.insert(name.to_string(), kind);
    }

    pub fn binding_kind(&self, name: &str) -> Option<BindingKind> {
        self.chain().find_map(|frame| frame.bound_names.get(name).copied())
    }

    pub fn is_visible(&self, name: &str) -> bool {
        self.binding_kind(name).is_some()
    }

    pub fn require_visible(&self, name: &str, context_label: &str) -> Result<BindingKind> {
        self.binding_kind(name).ok_or_else(|| {
            ConversionError::unresolved_variable(
                &self.component,
                name,
                context_label,
                self.visible_names(),
            )
        })
    }

    /// `this.name` reads the component's own fields, so loop frames never
    /// satisfy it.
    pub fn require_parameter(&self, name: &str, context_label: &str) -> Result<BindingKind> {
        let root = &self.frames[0].bound_names;
        root.get(name).copied().ok_or_else(|| {
            ConversionError::unresolved_variable(
                &self.component,
                name,
                context_label,
                root.keys().cloned().collect(),
            )
        })
    }

    /// Every visible name, sorted.
    pub fn visible_names(&self) -> Vec<String> {
        let names: BTreeSet<&String> = self
            .chain()
            .flat_map(|frame| frame.bound_names.keys())
            .collect();
        names.into_iter().cloned().collect()
    }

    pub fn current_loop_binding(&self) -> Option<&LoopBinding> {
        self.chain().find_map(|frame| frame.loop_binding.as_ref())
    }

    /// Innermost loop binding whose item is `name`, unless a nearer frame
    /// shadows `name` with some other binding.
    pub fn loop_binding_for(&self, name: &str) -> Option<&LoopBinding> {
        for frame in self.chain() {
            if frame.bound_names.contains_key(name) {
                return frame
                    .loop_binding
                    .as_ref()
                    .filter(|binding| binding.item == name);
            }
        }
        None
    }

    pub fn enter_generated_code_region(&mut self) {
        self.regions.push(RegionKind::Code);
    }

    pub fn exit_generated_code_region(&mut self) -> Result<()> {
        match self.regions.last() {
            Some(RegionKind::Code) => {
                self.regions.pop();
                Ok(())
            }
            _ => Err(ConversionError::scope_imbalance(
                &self.component,
                "'?>' closes a generated-code region that was never opened",
            )),
        }
    }

    pub fn in_generated_code_region(&self) -> bool {
        self.regions.last() == Some(&RegionKind::Code)
    }

    /// Terminal check: only the root frame and the markup region remain.
    pub fn finish(&self) -> Result<()> {
        if self.frames.len() != 1 {
            return Err(ConversionError::scope_imbalance(
                &self.component,
                format!(
                    "conversion ended with {} unclosed scope frame(s)",
                    self.frames.len() - 1
                ),
            ));
        }
        if self.regions.len() != 1 {
            return Err(ConversionError::scope_imbalance(
                &self.component,
                "conversion ended inside an unclosed <?php region",
            ));
        }
        Ok(())
    }
}
