#![cfg(target_arch = "wasm32")]

use serde_json::Value;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

use voltage_duel::GameEngine;

wasm_bindgen_test_configure!(run_in_browser);

fn parse(json: &str) -> Value {
    serde_json::from_str(json).expect("bridge returns JSON")
}

#[wasm_bindgen_test]
fn engine_starts_and_hides_voltage() {
    let mut engine = GameEngine::new(Some(r#"{"seed": 9}"#.to_string())).expect("config");
    let update = parse(&engine.start_game("Zinc", "Copper").expect("start"));
    assert_eq!(update["view"]["phase"], "A_DRAW");
    assert_eq!(update["view"]["teams"][0]["voltage"]["type"], "Hidden");
    assert!(update["events"]
        .as_array()
        .map_or(false, |events| !events.is_empty()));
}

#[wasm_bindgen_test]
fn misuse_throws_a_typed_error() {
    let mut engine = GameEngine::new(None).expect("default config");
    engine.start_game("Zinc", "Copper").expect("start");
    assert!(engine.draw(1).is_err());
    assert!(engine.draw(7).is_err());
}

#[wasm_bindgen_test]
fn connect_takes_terminal_names() {
    let mut engine = GameEngine::new(Some(r#"{"seed": 9}"#.to_string())).expect("config");
    engine.start_game("Zinc", "Copper").expect("start");
    while parse(&engine.view_json().expect("view"))["phase"] != "A_WIRING" {
        let epoch = parse(&engine.view_json().expect("view"))["clock_epoch"]
            .as_u64()
            .expect("epoch") as u32;
        engine.expire(epoch).expect("expire");
    }
    let update = parse(
        &engine
            .connect(0, JsValue::from_str("v_neg"), JsValue::from_str("c1_L"))
            .expect("connect"),
    );
    assert_eq!(update["view"]["teams"][0]["wires"][0]["from"], "v_neg");
}

#[wasm_bindgen_test]
fn state_json_is_sealed_during_play() {
    let mut engine = GameEngine::new(None).expect("default config");
    assert!(engine.state_json().is_ok());
    engine.start_game("Zinc", "Copper").expect("start");
    assert!(engine.state_json().is_err());
}

#[wasm_bindgen_test]
fn bad_config_is_rejected() {
    assert!(GameEngine::new(Some(r#"{"phase_seconds": 0}"#.to_string())).is_err());
}
