use std::sync::Arc;

use anyhow::{anyhow, Result};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{window, Document, KeyboardEvent};

use super::{InputState, KeyCode};

type KeyListener = Closure<dyn FnMut(KeyboardEvent)>;

/// Forwards DOM keyboard events into the shared [`InputState`].
pub struct KeyboardListener {
    document: Document,
    listeners: Vec<(&'static str, KeyListener)>,
}

impl KeyboardListener {
    pub fn attach(input: Arc<InputState>) -> Result<Self> {
        let document = window()
            .and_then(|window| window.document())
            .ok_or_else(|| anyhow!("document not available"))?;

        let down_state = Arc::clone(&input);
        let keydown: KeyListener = Closure::new(move |event: KeyboardEvent| {
            if let Some(code) = KeyCode::from_name(&event.key()) {
                event.prevent_default();
                down_state.set_key_down(code);
            }
        });
        let up_state = input;
        let keyup: KeyListener = Closure::new(move |event: KeyboardEvent| {
            if let Some(code) = KeyCode::from_name(&event.key()) {
                event.prevent_default();
                up_state.set_key_up(code);
            }
        });

        let listeners = vec![("keydown", keydown), ("keyup", keyup)];
        for (event, listener) in &listeners {
            document
                .add_event_listener_with_callback(event, listener.as_ref().unchecked_ref())
                .map_err(|err| anyhow!("failed to attach {event} listener: {err:?}"))?;
        }

        Ok(Self {
            document,
            listeners,
        })
    }
}

impl Drop for KeyboardListener {
    fn drop(&mut self) {
        for (event, listener) in self.listeners.drain(..) {
            let _ = self
                .document
                .remove_event_listener_with_callback(event, listener.as_ref().unchecked_ref());
        }
    }
}
