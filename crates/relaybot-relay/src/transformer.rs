//! Message transformation — optional generative rewrite of forwarded content.

use std::sync::Arc;

use tracing::{debug, warn};

use relaybot_core::types::Customization;
use relaybot_providers::TextRewriter;

/// Turns a raw inbound message into the text posted on the destination.
///
/// Never fails: any rewrite problem degrades to the canonical
/// `"{author}: {content}"` format.
#[derive(Clone, Default)]
pub struct MessageTransformer {
    rewriter: Option<Arc<dyn TextRewriter>>,
}

impl MessageTransformer {
    pub fn new(rewriter: Option<Arc<dyn TextRewriter>>) -> Self {
        Self { rewriter }
    }

    pub async fn transform(
        &self,
        raw_content: &str,
        author_name: &str,
        customization: &Customization,
    ) -> String {
        if !customization.is_active() {
            return canonical(author_name, raw_content);
        }

        let Some(rewriter) = &self.rewriter else {
            warn!("Customization enabled but no rewriter configured, forwarding unchanged");
            return canonical(author_name, raw_content);
        };

        match rewriter
            .rewrite(&customization.prompt, &user_turn(author_name, raw_content))
            .await
        {
            Ok(text) => {
                debug!(author = %author_name, "Message rewritten");
                format!("{author_name} (processed): {}", text.trim())
            }
            Err(e) => {
                warn!(error = %e, author = %author_name, "Rewrite failed, forwarding unchanged");
                canonical(author_name, raw_content)
            }
        }
    }
}

fn canonical(author: &str, content: &str) -> String {
    format!("{author}: {content}")
}

fn user_turn(author: &str, content: &str) -> String {
    format!("Author: {author}\nMessage: {content}")
}
