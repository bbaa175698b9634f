// Map Renderer Port
// Turns classified routes into an embeddable map document

use crate::domain::ResolvedRoute;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Route serialization failed: {0}")]
    Serialization(String),

    #[error("Renderer failed: {0}")]
    Failed(String),
}

/// Map renderer. Routes arrive grouped in category order
/// (delivery, collection, stock) and in input order within a category.
pub trait MapRenderer: Send + Sync {
    fn render(&self, routes: &[ResolvedRoute]) -> Result<String, RenderError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Renders a one-line summary, or fails on demand
    pub struct MockRenderer {
        failure: Option<String>,
        rendered: Mutex<Vec<Vec<ResolvedRoute>>>,
    }

    impl MockRenderer {
        pub fn new() -> Self {
            Self {
                failure: None,
                rendered: Mutex::new(Vec::new()),
            }
        }

        pub fn new_fail(message: impl Into<String>) -> Self {
            Self {
                failure: Some(message.into()),
                rendered: Mutex::new(Vec::new()),
            }
        }

        /// Route batches seen so far
        pub fn rendered(&self) -> Vec<Vec<ResolvedRoute>> {
            self.rendered.lock().unwrap().clone()
        }
    }

    impl Default for MockRenderer {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MapRenderer for MockRenderer {
        fn render(&self, routes: &[ResolvedRoute]) -> Result<String, RenderError> {
            if let Some(msg) = &self.failure {
                return Err(RenderError::Failed(msg.clone()));
            }
            self.rendered.lock().unwrap().push(routes.to_vec());
            Ok(format!("<div data-routes=\"{}\"></div>", routes.len()))
        }
    }
}
