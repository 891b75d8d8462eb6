use std::collections::HashMap;

use serde::Deserialize;

use crate::errors::{RentClawError, RentClawResult};
use crate::tools::schema::{Layout, ToolSchema};

#[derive(Deserialize)]
struct BuiltinTools {
    tools: Vec<ToolSchema>,
}

/// Immutable name → schema lookup, fixed at startup.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    /// Registration order, used for prompts and help output.
    schemas: Vec<ToolSchema>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new(schemas: Vec<ToolSchema>) -> RentClawResult<Self> {
        let mut index = HashMap::with_capacity(schemas.len());
        for (i, schema) in schemas.iter().enumerate() {
            if schema.name.trim().is_empty() {
                return Err(RentClawError::Config("tool with empty name".into()));
            }
            if index.insert(schema.name.clone(), i).is_some() {
                return Err(RentClawError::Config(format!(
                    "tool '{}' registered twice",
                    schema.name
                )));
            }
        }
        Ok(Self { schemas, index })
    }

    /// The rental tools from prompts/tools/builtin.json, embedded at compile time.
    pub fn builtin() -> RentClawResult<Self> {
        let json = include_str!("../../prompts/tools/builtin.json");
        let parsed: BuiltinTools = serde_json::from_str(json)
            .map_err(|e| RentClawError::Config(format!("Failed to parse builtin tools: {e}")))?;
        Self::new(parsed.tools)
    }

    /// Builtin tools followed by `extra` (e.g. `[[tools.extra]]` from config.toml).
    pub fn builtin_with(extra: Vec<ToolSchema>) -> RentClawResult<Self> {
        let mut schemas = Self::builtin()?.schemas;
        schemas.extend(extra);
        Self::new(schemas)
    }

    pub fn is_registered(&self, tool_name: &str) -> bool {
        self.index.contains_key(tool_name)
    }

    pub fn get(&self, tool_name: &str) -> RentClawResult<&ToolSchema> {
        self.index
            .get(tool_name)
            .map(|&i| &self.schemas[i])
            .ok_or_else(|| RentClawError::UnknownTool(tool_name.to_string()))
    }

    pub fn required_params(&self, tool_name: &str) -> RentClawResult<&[String]> {
        self.get(tool_name).map(|s| s.required_params.as_slice())
    }

    pub fn layout(&self, tool_name: &str) -> Option<Layout> {
        self.get(tool_name).ok().and_then(|s| s.layout)
    }

    pub fn schemas(&self) -> &[ToolSchema] {
        &self.schemas
    }

    pub fn names(&self) -> Vec<&str> {
        self.schemas.iter().map(|s| s.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registers_rental_tools_in_order() {
        let registry = ToolRegistry::builtin().unwrap();
        assert_eq!(registry.names(), vec!["search_cars", "get_car_details", "book_car"]);
        assert_eq!(
            registry.required_params("search_cars").unwrap(),
            ["location", "start_date", "end_date"]
        );
        assert_eq!(
            registry.required_params("book_car").unwrap(),
            ["car_id", "customer_name", "start_date"]
        );
        assert_eq!(registry.layout("get_car_details"), Some(Layout::CarDetails));
    }

    #[test]
    fn unknown_tool_is_an_error() {
        let registry = ToolRegistry::builtin().unwrap();
        assert!(!registry.is_registered("launch_rocket"));
        assert!(matches!(
            registry.required_params("launch_rocket"),
            Err(RentClawError::UnknownTool(name)) if name == "launch_rocket"
        ));
        assert_eq!(registry.layout("launch_rocket"), None);
    }

    #[test]
    fn extra_tools_extend_builtin() {
        let extra = vec![ToolSchema::new("cancel_booking", &["booking_id"])];
        let registry = ToolRegistry::builtin_with(extra).unwrap();
        assert!(registry.is_registered("cancel_booking"));
        assert!(registry.is_registered("book_car"));
        assert_eq!(registry.layout("cancel_booking"), None);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let extra = vec![ToolSchema::new("book_car", &["car_id"])];
        assert!(matches!(
            ToolRegistry::builtin_with(extra),
            Err(RentClawError::Config(_))
        ));
    }
}
