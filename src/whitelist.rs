//! Whitelist policy store: which canonical identities stay visible in the
//! host's native quick-reply bar.
//!
//! Membership is the union of a compile-time builtin allow-list and the
//! user-editable whitelist. Builtin entries can never be removed or hidden.

use serde::de::{Deserializer, SeqAccess, Visitor};
use serde::Deserialize;

use crate::identity::CanonicalId;

/// Identities that are always treated as whitelisted, regardless of user
/// settings. Entries may be canonical ids (`JSR::...`, `QRV2::...`) or raw
/// element ids of helper toolbars other plugins inject into the native bar.
pub const BUILTIN_WHITELIST: &[&str] = &["input_helper_toolbar", "custom_buttons_container"];

/// Outcome of a toggle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added,
    Removed,
    /// Builtin ids are not togglable; the whitelist is unchanged.
    RejectedBuiltin,
}

/// The user-editable whitelist plus builtin membership checks.
///
/// Ordered, duplicate-free sequence of canonical id strings. Order is kept
/// only for presentation; policy evaluation is pure membership.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhitelistPolicy {
    entries: Vec<String>,
}

impl WhitelistPolicy {
    pub fn new(entries: Vec<String>) -> Self {
        let mut policy = WhitelistPolicy::default();
        for entry in entries {
            if !policy.entries.contains(&entry) {
                policy.entries.push(entry);
            }
        }
        policy
    }

    /// True iff `id` is builtin or user-whitelisted.
    pub fn is_allowed(&self, id: &CanonicalId) -> bool {
        self.is_builtin(id.as_str()) || self.entries.iter().any(|e| e == id.as_str())
    }

    /// True iff `id` (canonical or raw element id) is on the builtin list.
    pub fn is_builtin(&self, id: &str) -> bool {
        BUILTIN_WHITELIST.contains(&id)
    }

    /// Toggle membership: present → remove, absent → append.
    /// Builtin ids are rejected unchanged; they are never removable and
    /// toggling them off must not hide the element.
    pub fn toggle(&mut self, id: &CanonicalId) -> ToggleOutcome {
        if self.is_builtin(id.as_str()) {
            return ToggleOutcome::RejectedBuiltin;
        }
        if let Some(pos) = self.entries.iter().position(|e| e == id.as_str()) {
            self.entries.remove(pos);
            ToggleOutcome::Removed
        } else {
            self.entries.push(id.as_str().to_string());
            ToggleOutcome::Added
        }
    }

    /// Presentation order only; carries no policy meaning.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<String> {
        self.entries
    }
}

/// Deserialize a whitelist leniently: anything that is not a sequence of
/// strings becomes an empty list instead of a parse error, and non-string
/// elements are dropped. An empty whitelist only hides more items, whereas a
/// hard error would take the whole settings file down with it.
pub fn lenient_string_seq<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct LenientSeq;

    impl<'de> Visitor<'de> for LenientSeq {
        type Value = Vec<String>;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("a sequence of strings")
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut out = Vec::new();
            while let Some(value) = seq.next_element::<serde_json::Value>()? {
                if let serde_json::Value::String(s) = value {
                    out.push(s);
                }
            }
            Ok(out)
        }

        // Any non-sequence shape (object, number, string, bool, null)
        // resets to empty.
        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: serde::de::MapAccess<'de>,
        {
            while map
                .next_entry::<serde::de::IgnoredAny, serde::de::IgnoredAny>()?
                .is_some()
            {}
            Ok(Vec::new())
        }

        fn visit_str<E: serde::de::Error>(self, _: &str) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_bool<E: serde::de::Error>(self, _: bool) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_i64<E: serde::de::Error>(self, _: i64) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_u64<E: serde::de::Error>(self, _: u64) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_f64<E: serde::de::Error>(self, _: f64) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(LenientSeq)
}

/// Wrapper so the lenient deserializer can be exercised outside struct fields.
#[cfg(test)]
#[derive(Debug, Deserialize)]
pub(crate) struct LenientWhitelist(
    #[serde(deserialize_with = "lenient_string_seq")] pub(crate) Vec<String>,
);

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> CanonicalId {
        CanonicalId::from(s)
    }

    #[test]
    fn builtin_ids_always_allowed_with_empty_whitelist() {
        let policy = WhitelistPolicy::default();
        for builtin in BUILTIN_WHITELIST {
            assert!(policy.is_allowed(&id(builtin)));
        }
        assert!(!policy.is_allowed(&id("QRV2::Greetings")));
    }

    #[test]
    fn toggle_is_involutive_for_non_builtin() {
        let mut policy = WhitelistPolicy::default();
        let target = id("JSR::script-1");

        assert_eq!(policy.toggle(&target), ToggleOutcome::Added);
        assert!(policy.is_allowed(&target));

        assert_eq!(policy.toggle(&target), ToggleOutcome::Removed);
        assert!(!policy.is_allowed(&target));
        assert!(policy.entries().is_empty());
    }

    #[test]
    fn toggle_builtin_is_rejected_and_stays_allowed() {
        let mut policy = WhitelistPolicy::default();
        let builtin = id("input_helper_toolbar");

        assert_eq!(policy.toggle(&builtin), ToggleOutcome::RejectedBuiltin);
        assert!(policy.entries().is_empty());
        assert!(policy.is_allowed(&builtin));

        // Second attempt behaves identically
        assert_eq!(policy.toggle(&builtin), ToggleOutcome::RejectedBuiltin);
        assert!(policy.is_allowed(&builtin));
    }

    #[test]
    fn new_deduplicates_but_keeps_order() {
        let policy = WhitelistPolicy::new(vec![
            "QRV2::B".to_string(),
            "QRV2::A".to_string(),
            "QRV2::B".to_string(),
        ]);
        assert_eq!(policy.entries(), ["QRV2::B", "QRV2::A"]);
    }

    #[test]
    fn toggle_appends_at_end() {
        let mut policy = WhitelistPolicy::new(vec!["QRV2::A".to_string()]);
        policy.toggle(&id("QRV2::B"));
        assert_eq!(policy.entries(), ["QRV2::A", "QRV2::B"]);
    }

    #[test]
    fn lenient_parses_valid_sequence() {
        let parsed: LenientWhitelist = serde_json::from_str(r#"["QRV2::A", "JSR::s1"]"#).unwrap();
        assert_eq!(parsed.0, ["QRV2::A", "JSR::s1"]);
    }

    #[test]
    fn lenient_drops_non_string_elements() {
        let parsed: LenientWhitelist =
            serde_json::from_str(r#"["QRV2::A", 42, null, "JSR::s1"]"#).unwrap();
        assert_eq!(parsed.0, ["QRV2::A", "JSR::s1"]);
    }

    #[test]
    fn lenient_resets_non_sequence_values_to_empty() {
        for corrupt in [r#""oops""#, "42", "true", "null", r#"{"a":1}"#] {
            let parsed: LenientWhitelist = serde_json::from_str(corrupt)
                .unwrap_or_else(|e| panic!("{corrupt} should not error: {e}"));
            assert!(parsed.0.is_empty(), "{corrupt} should reset to empty");
        }
    }
}
