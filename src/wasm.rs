use crate::codegen::{EmitOptions, TopLevelOrder};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub fn generate_python(xml: &str) -> Result<String, JsValue> {
    generate_python_with_options(xml, false)
}

#[wasm_bindgen]
pub fn generate_python_with_options(xml: &str, visual_order: bool) -> Result<String, JsValue> {
    let order = if visual_order {
        TopLevelOrder::Visual
    } else {
        TopLevelOrder::Insertion
    };
    crate::generate_python(xml, EmitOptions { order })
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
pub fn normalize_document(xml: &str) -> Result<String, JsValue> {
    crate::normalize_document(xml).map_err(|e| JsValue::from_str(&e.to_string()))
}
