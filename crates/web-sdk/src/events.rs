//! DOM event types: the browser events a host forwards into the tracker,
//! and the minimal element model the custom-event detector inspects.

use serde::{Deserialize, Serialize};

/// The subset of an HTML element the tracker reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub tag: String,
    pub id: Option<String>,
    /// Fully resolved `href` (links only).
    pub href: Option<String>,
    /// Browsing-context target, e.g. `_blank`.
    pub target: Option<String>,
    pub classes: Vec<String>,
    /// `novalidate` attribute (forms only).
    pub novalidate: bool,
    /// Result of `checkValidity()` (forms only).
    pub valid: bool,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            valid: true,
            ..Default::default()
        }
    }

    pub fn link(href: impl Into<String>) -> Self {
        Self {
            href: Some(href.into()),
            ..Self::new("a")
        }
    }

    pub fn form() -> Self {
        Self::new("form")
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Add whitespace-separated class names, like a `class` attribute.
    pub fn with_classes(mut self, classes: &str) -> Self {
        self.classes
            .extend(classes.split_whitespace().map(str::to_string));
        self
    }

    pub fn with_novalidate(mut self) -> Self {
        self.novalidate = true;
        self
    }

    pub fn invalid(mut self) -> Self {
        self.valid = false;
        self
    }

    pub fn is_link(&self) -> bool {
        self.tag.eq_ignore_ascii_case("a")
    }

    pub fn is_form(&self) -> bool {
        self.tag.eq_ignore_ascii_case("form")
    }

    /// Non-empty `href`, if any.
    pub fn href(&self) -> Option<&str> {
        self.href.as_deref().filter(|h| !h.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Click,
    AuxClick,
    Submit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl Modifiers {
    pub fn any(&self) -> bool {
        self.ctrl || self.meta || self.shift
    }
}

/// A click, auxclick, or submit as seen by a document-level listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub kind: InteractionKind,
    pub button: u16,
    pub modifiers: Modifiers,
    pub default_prevented: bool,
    /// Event target followed by its ancestors, innermost first.
    pub path: Vec<Element>,
}

impl Interaction {
    pub fn click(path: Vec<Element>) -> Self {
        Self {
            kind: InteractionKind::Click,
            button: 0,
            modifiers: Modifiers::default(),
            default_prevented: false,
            path,
        }
    }

    pub fn aux_click(path: Vec<Element>, button: u16) -> Self {
        Self {
            kind: InteractionKind::AuxClick,
            button,
            ..Self::click(path)
        }
    }

    pub fn submit(path: Vec<Element>) -> Self {
        Self {
            kind: InteractionKind::Submit,
            ..Self::click(path)
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn prevented(mut self) -> Self {
        self.default_prevented = true;
        self
    }

    pub fn target(&self) -> Option<&Element> {
        self.path.first()
    }
}

/// Browser events the tracker listens to. Hosts send them as JSON objects
/// tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomEvent {
    Load,
    Scroll,
    VisibilityChange,
    Focus,
    Blur,
    PushState,
    PopState,
    HashChange,
    PageShow { persisted: bool },
    Interaction(Interaction),
}

/// What the host should do with the browser event after dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    #[default]
    Proceed,
    /// Call `preventDefault()`; the tracker will perform the default action
    /// itself once the event has been sent.
    PreventDefault,
}
