//! Built-in tool implementations for Reagent.
//!
//! [`ToolCatalog`] is the in-process registry and executor the agent loop
//! runs against. The built-ins work offline.

pub mod calculator;
pub mod registry;
pub mod web_search;

pub use registry::ToolCatalog;

/// Create a catalog with all built-in tools, minus `disabled` ids.
pub fn default_catalog(disabled: &[String]) -> ToolCatalog {
    let mut catalog = ToolCatalog::new();
    catalog.register(std::sync::Arc::new(calculator::CalculatorTool));
    catalog.register(std::sync::Arc::new(web_search::WebSearchTool));
    for id in disabled {
        catalog.disable_now(id);
    }
    catalog
}
