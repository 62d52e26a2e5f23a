//! Seam between the presentation state machine and whatever draws it

use std::sync::Arc;

use async_trait::async_trait;

use crate::presenter::{MenuEntry, RenderState};

/// Something the user did on the indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    /// A menu entry was clicked
    Activate(MenuEntry),
    /// Primary click on the icon itself
    ActivateIcon,
    ScrollUp,
    ScrollDown,
}

/// Receives user actions. Returns `false` once the receiving side is gone.
pub type ActionSink = Arc<dyn Fn(UserAction) -> bool + Send + Sync>;

/// A place the indicator renders into
#[async_trait]
pub trait Surface: Send {
    /// Replace whatever is shown with `view`
    async fn apply_view(&mut self, view: &RenderState) -> anyhow::Result<()>;

    /// Remove the indicator for good
    async fn destroy(&mut self) -> anyhow::Result<()>;
}
