//! In-page scripts run through `POST /session/{id}/execute/sync`.
//!
//! Every script takes its inputs via `arguments` so selectors and marker
//! vocabularies stay in configuration.

/// `(selectors: string[], requireEnabled: bool) -> Element | null`
pub const FIRST_VISIBLE: &str = r#"
const [selectors, requireEnabled] = arguments;
const visible = (el) => !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
for (const sel of selectors) {
  let nodes;
  try { nodes = document.querySelectorAll(sel); } catch (_e) { continue; }
  for (const el of nodes) {
    if (!visible(el)) continue;
    if (requireEnabled && (el.disabled || el.hasAttribute('disabled'))) continue;
    return el;
  }
}
return null;
"#;

/// `(selectors: string[]) -> bool`
pub const DISPATCH_INPUT_EVENTS: &str = r#"
const [selectors] = arguments;
const visible = (el) => !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
for (const sel of selectors) {
  let nodes;
  try { nodes = document.querySelectorAll(sel); } catch (_e) { continue; }
  for (const el of nodes) {
    if (!visible(el)) continue;
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
    el.dispatchEvent(new KeyboardEvent('keyup', { bubbles: true, key: 'a' }));
    return true;
  }
}
return false;
"#;

/// `(wanted: string) -> bool`
pub const SELECT_OPTION: &str = r#"
const wanted = arguments[0].toLowerCase();
for (const select of document.querySelectorAll('select')) {
  for (const option of select.querySelectorAll('option')) {
    const label = (option.innerText || option.textContent || '').trim();
    if (label.toLowerCase().includes(wanted)) {
      select.value = option.value;
      select.dispatchEvent(new Event('change', { bubbles: true }));
      return true;
    }
  }
}
return false;
"#;

/// `(buttonSelectors: string[], inputSelectors: string[]) -> bool`
pub const FORCE_SUBMIT: &str = r#"
const [buttonSelectors, inputSelectors] = arguments;
const first = (sels) => {
  for (const sel of sels) {
    try { const el = document.querySelector(sel); if (el) return el; } catch (_e) {}
  }
  return null;
};
const button = first(buttonSelectors);
const input = first(inputSelectors);
const form = (button && button.form) || (input && input.form) || document.querySelector('form');
if (!form) return false;
try {
  if (typeof form.requestSubmit === 'function') { form.requestSubmit(); } else { form.submit(); }
  return true;
} catch (_e) {
  return false;
}
"#;

/// `(buttonSelectors: string[]) -> string`
pub const SUBMIT_STATE: &str = r#"
const [buttonSelectors] = arguments;
for (const sel of buttonSelectors) {
  let el = null;
  try { el = document.querySelector(sel); } catch (_e) {}
  if (el) return `search button disabled=${el.disabled || el.hasAttribute('disabled')}`;
}
return 'search button not found';
"#;

/// `(noResultMarkers: string[]) -> bool`
pub const RESULTS_READY: &str = r#"
const [markers] = arguments;
const body = (document.body ? document.body.innerText : '').toLowerCase();
if (markers.some((m) => body.includes(m.toLowerCase()))) return true;
for (const table of document.querySelectorAll('table')) {
  if (table.querySelectorAll('tr').length > 0) return true;
}
return false;
"#;

/// `(detailMarkers: string[]) -> { rows, bodyText, url }`
///
/// Each row is `{ cells: [[label, value], ...], detail: {...} | null, index }`.
/// Cells are pairs so column order survives JSON decoding.
pub const EXTRACT_ROWS: &str = r#"
const [markers] = arguments;
const clean = (s) => (s || '').replace(/\s+/g, ' ').trim();
const lowered = markers.map((m) => m.toLowerCase());
const mentions = (s) => lowered.some((m) => s.includes(m));

let best = null;
let bestRows = [];
for (const table of document.querySelectorAll('table')) {
  if (table.offsetParent === null) continue;
  const bodyRows = Array.from(table.querySelectorAll('tbody tr'));
  const rows = bodyRows.length > 0 ? bodyRows : Array.from(table.querySelectorAll('tr'));
  if (rows.length > bestRows.length) { best = table; bestRows = rows; }
}

const bodyText = clean(document.body ? document.body.innerText : '');
const out = { rows: [], bodyText, url: window.location.href };
if (!best) return out;

let headers = Array.from(best.querySelectorAll('thead th')).map((h) => clean(h.innerText));
if (headers.length === 0 && bestRows.length > 0) {
  const ths = Array.from(bestRows[0].querySelectorAll('th'));
  if (ths.length > 0) {
    headers = ths.map((h) => clean(h.innerText));
    bestRows = bestRows.slice(1);
  }
}

bestRows.forEach((tr, i) => {
  const cells = Array.from(tr.querySelectorAll('td, th'));
  if (cells.length === 0) return;
  const pairs = cells.map((cell, idx) => [headers[idx] || `col_${idx + 1}`, clean(cell.innerText)]);

  let detail = null;
  const controls = tr.querySelectorAll("a, button, input[type='button'], input[type='submit'], [onclick]");
  for (const el of controls) {
    const text = clean(el.innerText || el.value || el.title);
    const href = clean(el.getAttribute('href'));
    const onclick = clean(el.getAttribute('onclick'));
    if (mentions(text.toLowerCase()) || mentions(href.toLowerCase()) || mentions(onclick.toLowerCase())) {
      let url = '';
      if (href && !href.toLowerCase().startsWith('javascript:')) {
        try { url = new URL(href, window.location.href).href; } catch (_e) { url = href; }
      }
      detail = { text, href, onclick, url };
      break;
    }
  }

  if (pairs.some(([, v]) => v !== '') || detail) {
    out.rows.push({ cells: pairs, detail, index: i + 1 });
  }
});
return out;
"#;

/// `(index: number, markers: string[]) -> { ok, reason }`
pub const CLICK_ROW_DETAIL: &str = r#"
const [index, markers] = arguments;
const clean = (s) => (s || '').replace(/\s+/g, ' ').trim().toLowerCase();
const lowered = markers.map((m) => m.toLowerCase());

let bestRows = [];
for (const table of document.querySelectorAll('table')) {
  if (table.offsetParent === null) continue;
  const bodyRows = Array.from(table.querySelectorAll('tbody tr'));
  const rows = bodyRows.length > 0 ? bodyRows : Array.from(table.querySelectorAll('tr'));
  if (rows.length > bestRows.length) bestRows = rows;
}
if (bestRows.length === 0) return { ok: false, reason: 'no-result-table' };
if (bestRows.length > 0 && bestRows[0].querySelectorAll('td').length === 0) bestRows = bestRows.slice(1);
const target = bestRows[index - 1];
if (!target) return { ok: false, reason: 'no-such-row' };

const candidates = Array.from(
  target.querySelectorAll("a, button, input[type='button'], input[type='submit'], [onclick]")
);
if (candidates.length === 0) return { ok: false, reason: 'no-clickable' };

const score = (el) => {
  const text = clean(el.innerText || el.value || el.title);
  const attrs = clean(el.getAttribute('href')) + ' ' + clean(el.getAttribute('onclick'));
  let s = 0;
  for (const m of lowered) {
    if (text.includes(m)) s += 2;
    if (attrs.includes(m)) s += 1;
  }
  return s;
};

let chosen = null;
let bestScore = 0;
for (const el of candidates) {
  const s = score(el);
  if (s > bestScore) { chosen = el; bestScore = s; }
}
if (!chosen) return { ok: false, reason: 'no-detail-element' };
chosen.click();
return { ok: true, reason: 'clicked' };
"#;

/// `(weakSelectors: string[]) -> { text, visual, url }`
pub const PAGE_SIGNALS: &str = r#"
const [selectors] = arguments;
const text = document.body ? document.body.innerText : '';
let visual = false;
for (const sel of selectors) {
  try { if (document.querySelector(sel)) { visual = true; break; } } catch (_e) {}
}
return { text, visual, url: window.location.href };
"#;

/// `(markers: string[]) -> string[]`
pub const EMBEDDED_LINKS: &str = r#"
const [markers] = arguments;
const lowered = markers.map((m) => m.toLowerCase());
const urls = [];
const nodes = document.querySelectorAll('a[href], iframe[src], embed[src], object[data]');
for (const node of nodes) {
  const raw = node.getAttribute('href') || node.getAttribute('src') || node.getAttribute('data') || '';
  if (!raw) continue;
  const low = raw.toLowerCase();
  if (!lowered.some((m) => low.includes(m))) continue;
  try { urls.push(new URL(raw, window.location.href).href); } catch (_e) {}
}
return Array.from(new Set(urls));
"#;

/// `(selectors: string[], texts: string[]) -> Element[]`: icon controls
/// first, at most five per selector, then visible links and buttons whose
/// label contains one of `texts`.
pub const PRINT_CONTROLS: &str = r#"
const [selectors, texts] = arguments;
const visible = (el) => !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
const out = [];
for (const sel of selectors) {
  let nodes;
  try { nodes = Array.from(document.querySelectorAll(sel)); } catch (_e) { continue; }
  for (const node of nodes.slice(0, 5)) {
    if (!visible(node)) continue;
    const target = node.closest('a, button') || node;
    if (!out.includes(target)) out.push(target);
  }
}
const labels = (texts || []).map((t) => t.toLowerCase()).filter((t) => t);
if (labels.length) {
  for (const node of document.querySelectorAll('a, button')) {
    if (!visible(node) || out.includes(node)) continue;
    const label = (node.innerText || node.textContent || '').toLowerCase();
    if (labels.some((t) => label.includes(t))) out.push(node);
  }
}
return out;
"#;

/// `() -> string`
pub const READY_STATE: &str = "return document.readyState;";
