//! Page snapshots shown to the agent
//!
//! A script injected into the page tags every visible interactive element
//! with a `data-mutuals-ref` attribute and reports it with its role and
//! accessible name. The agent addresses elements by those refs.

use serde::{Deserialize, Serialize};

/// Attribute used to address elements from tool calls
pub const REF_ATTRIBUTE: &str = "data-mutuals-ref";

/// Maximum elements reported per snapshot
const MAX_ELEMENTS: usize = 150;

/// Script evaluated in the page; returns the snapshot as a JSON string
pub const SNAPSHOT_SCRIPT: &str = r#"
(() => {
  const selector = 'a[href], button, input, textarea, select, [role="button"], [role="link"], [role="tab"], [role="menuitem"], [contenteditable="true"]';
  document.querySelectorAll('[data-mutuals-ref]').forEach(el => el.removeAttribute('data-mutuals-ref'));
  const roleOf = el => {
    const explicit = el.getAttribute('role');
    if (explicit) return explicit;
    const tag = el.tagName.toLowerCase();
    if (tag === 'a') return 'link';
    if (tag === 'button') return 'button';
    if (tag === 'select') return 'combobox';
    if (tag === 'textarea') return 'textbox';
    if (tag === 'input') {
      const type = (el.getAttribute('type') || 'text').toLowerCase();
      if (type === 'checkbox') return 'checkbox';
      if (type === 'radio') return 'radio';
      if (type === 'submit' || type === 'button') return 'button';
      if (type === 'search') return 'searchbox';
      return 'textbox';
    }
    return 'generic';
  };
  const visible = el => {
    const rect = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    return rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden' && style.display !== 'none';
  };
  const elements = [];
  let n = 0;
  for (const el of document.querySelectorAll(selector)) {
    if (elements.length >= __LIMIT__) break;
    if (!visible(el)) continue;
    n += 1;
    const ref = 'e' + n;
    el.setAttribute('data-mutuals-ref', ref);
    const name = (el.getAttribute('aria-label') || el.innerText || el.value || el.getAttribute('placeholder') || '').trim().replace(/\s+/g, ' ').slice(0, 120);
    elements.push({
      ref: ref,
      role: roleOf(el),
      name: name,
      value: (el.tagName === 'INPUT' || el.tagName === 'TEXTAREA') ? el.value : null,
      href: el.getAttribute('href'),
      focused: document.activeElement === el
    });
  }
  return JSON.stringify({ url: location.href, title: document.title, elements: elements });
})()
"#;

/// The snapshot script with the element limit filled in
pub fn snapshot_script() -> String {
    SNAPSHOT_SCRIPT.replace("__LIMIT__", &MAX_ELEMENTS.to_string())
}

/// Interactive view of the current page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Page URL when the snapshot was taken
    #[serde(default)]
    pub url: String,
    /// Document title
    #[serde(default)]
    pub title: String,
    /// Tagged elements in document order
    #[serde(default)]
    pub elements: Vec<Element>,
}

/// An element in the snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Element {
    /// Ref used by `click` and `fill`
    #[serde(rename = "ref")]
    pub ref_id: String,
    /// ARIA role
    #[serde(default)]
    pub role: String,
    /// Accessible name
    #[serde(default)]
    pub name: String,
    /// Element value (for inputs)
    #[serde(default)]
    pub value: Option<String>,
    /// Link target
    #[serde(default)]
    pub href: Option<String>,
    /// Whether element is focused
    #[serde(default)]
    pub focused: bool,
}

impl Snapshot {
    /// Parse the JSON string produced by [`SNAPSHOT_SCRIPT`]
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn count_elements(&self) -> usize {
        self.elements.len()
    }

    /// Get an element by ref
    pub fn get_element(&self, ref_id: &str) -> Option<&Element> {
        let clean_ref = ref_id.strip_prefix('@').unwrap_or(ref_id);
        self.elements.iter().find(|el| el.ref_id == clean_ref)
    }

    /// Find elements containing text in their name
    pub fn find_by_text(&self, text: &str) -> Vec<&Element> {
        let text_lower = text.to_lowercase();
        self.elements
            .iter()
            .filter(|el| el.name.to_lowercase().contains(&text_lower))
            .collect()
    }

    /// Format snapshot for the agent prompt
    pub fn format_for_display(&self) -> String {
        let mut output = format!("URL: {}\nTitle: {}\n", self.url, self.title);
        if self.elements.is_empty() {
            output.push_str("No interactive elements found\n");
            return output;
        }

        output.push_str("Page Elements:\n");
        for element in &self.elements {
            let value_str = element
                .value
                .as_ref()
                .filter(|v| !v.is_empty())
                .map(|v| format!(" = \"{}\"", v))
                .unwrap_or_default();
            let href_str = element
                .href
                .as_ref()
                .map(|h| format!(" -> {}", h))
                .unwrap_or_default();

            output.push_str(&format!(
                "  [ref={}] {} \"{}\"{}{}",
                element.ref_id, element.role, element.name, value_str, href_str
            ));
            if element.focused {
                output.push_str(" [focused]");
            }
            output.push('\n');
        }
        output
    }
}

impl Element {
    /// Check if this is an input element
    pub fn is_input(&self) -> bool {
        matches!(
            self.role.as_str(),
            "textbox" | "searchbox" | "combobox" | "spinbutton"
        )
    }

    /// Check if this is clickable
    pub fn is_clickable(&self) -> bool {
        matches!(
            self.role.as_str(),
            "button" | "link" | "menuitem" | "tab" | "checkbox" | "radio" | "switch"
        )
    }
}

/// CSS selector addressing an element by ref
pub fn ref_selector(ref_id: &str) -> String {
    let clean_ref = ref_id.trim().trim_start_matches('@');
    format!("[{}=\"{}\"]", REF_ATTRIBUTE, clean_ref.replace('"', ""))
}
