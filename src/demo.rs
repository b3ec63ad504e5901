// Demo mode: a built-in layout exercising the whole lifecycle
//
// A small mail client: a singly page with a collection-backed inbox, a
// settings panel and an overlay help panel. The steps show the inbox
// (deferred until its collection loads), reload it with different params,
// switch to settings, open the overlay and relay a bubbled event.
//
// Run with: trellis demo

use crate::config::Config;
use crate::layout::{Layout, LayoutFile};
use anyhow::Result;

/// Layout run by `trellis demo`
pub const DEMO_LAYOUT: &str = r#"
[[classes]]
tag = "Page"
defaults = { singly = true }

[[classes]]
tag = "Mailbox"
extends = "CollectionComponent"
defaults = { defaultParams = { sort = "received", limit = 3 } }

[root]
name = "mail"
class = "Page"
view = "tracing"

[[root.children]]
name = "inbox"
class = "Mailbox"
view = "tracing"
options = { debug = true }

[root.children.collection]
source = "memory"

[[root.children.collection.items]]
subject = "Quarterly report"
from = "dana"
received = 4

[[root.children.collection.items]]
subject = "Lunch?"
from = "eli"
received = 2

[[root.children.collection.items]]
subject = "Build is green"
from = "ci"
received = 5

[[root.children.collection.items]]
subject = "Welcome"
from = "team"
received = 1

[[root.children]]
name = "settings"
view = "tracing"

[[root.children.children]]
name = "profile"
view = "tracing"

[[root.children]]
name = "help"
view = "detached"
options = { overlay = true }

[[root.bubble]]
child = "settings"
event = "settings:saved"

[[steps]]
action = "show"
target = "inbox"

[[steps]]
action = "settle"

[[steps]]
action = "show"
target = "inbox"
params = { sort = "from" }

[[steps]]
action = "settle"

[[steps]]
action = "show"
target = "settings.profile"

[[steps]]
action = "show"
target = "help"

[[steps]]
action = "trigger"
target = "settings"
event = "settings:saved"
args = ["profile"]

[[steps]]
action = "hide"
target = "help"
"#;

/// Build the demo layout and run its steps
pub async fn run_demo(config: &Config) -> Result<Layout> {
    let file = LayoutFile::parse(DEMO_LAYOUT)?;
    let mut layout = Layout::build(&file, config)?;

    tracing::info!(steps = file.steps.len(), "running demo layout");
    layout.run(&file.steps).await?;
    layout.settle().await;

    Ok(layout)
}
