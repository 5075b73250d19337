//! Console logging that works both inside the browser and in native test runs.

#[cfg(target_arch = "wasm32")]
mod console {
    use wasm_bindgen::JsValue;

    pub fn log_line(message: &str) {
        web_sys::console::log_1(&JsValue::from_str(message));
    }

    pub fn warn_line(message: &str) {
        web_sys::console::warn_1(&JsValue::from_str(message));
    }
}

#[cfg(target_arch = "wasm32")]
pub use console::{log_line, warn_line};

#[cfg(not(target_arch = "wasm32"))]
pub fn log_line(message: &str) {
    println!("{message}");
}

#[cfg(not(target_arch = "wasm32"))]
pub fn warn_line(message: &str) {
    eprintln!("{message}");
}
