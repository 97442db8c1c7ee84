//! Global shortcuts bound to a fixed object/action pair.

use crate::hotkey::Hotkey;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerBinding {
    pub hotkey: Hotkey,
    pub object_id: String,
    pub action_id: String,
}

#[derive(Debug, Default, Clone)]
pub struct TriggerTable {
    bindings: HashMap<Hotkey, TriggerBinding>,
}

impl TriggerTable {
    pub fn new(bindings: impl IntoIterator<Item = TriggerBinding>) -> Self {
        let mut table = Self::default();
        for binding in bindings {
            table.bind(binding);
        }
        table
    }

    /// Add `binding`, replacing any earlier binding of the same hotkey.
    pub fn bind(&mut self, binding: TriggerBinding) -> Option<TriggerBinding> {
        let previous = self.bindings.insert(binding.hotkey, binding);
        if let Some(prev) = &previous {
            tracing::warn!(hotkey = %prev.hotkey, "trigger rebound");
        }
        previous
    }

    pub fn unbind(&mut self, hotkey: &Hotkey) -> Option<TriggerBinding> {
        self.bindings.remove(hotkey)
    }

    pub fn get(&self, hotkey: &Hotkey) -> Option<&TriggerBinding> {
        self.bindings.get(hotkey)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::parse_hotkey;

    fn binding(hk: &str, obj: &str) -> TriggerBinding {
        TriggerBinding {
            hotkey: parse_hotkey(hk).unwrap(),
            object_id: obj.into(),
            action_id: "launch".into(),
        }
    }

    #[test]
    fn later_binding_replaces_earlier() {
        let table = TriggerTable::new([binding("Ctrl+Alt+T", "term"), binding("ctrl+alt+t", "xterm")]);
        assert_eq!(table.len(), 1);
        let hk = parse_hotkey("Ctrl+Alt+T").unwrap();
        assert_eq!(table.get(&hk).unwrap().object_id, "xterm");
    }
}
