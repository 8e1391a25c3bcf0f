use regex::Regex;
use serde_json::Value;

/// Number layout used when rendering money.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberLocale {
    /// `-€1,234.56`
    #[default]
    English,
    /// `€ -1.234,56`
    Dutch,
    /// `-1.234,56 €`
    German,
}

impl NumberLocale {
    /// Pick a layout from a language tag such as `en-US`, `nl_NL` or `de`.
    pub fn from_tag(tag: &str) -> Self {
        let language = tag
            .split(['-', '_', '.'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        match language.as_str() {
            "nl" => NumberLocale::Dutch,
            "de" | "fr" | "es" | "it" | "pt" | "at" => NumberLocale::German,
            _ => NumberLocale::English,
        }
    }

    fn separators(self) -> (char, char) {
        match self {
            NumberLocale::English => (',', '.'),
            NumberLocale::Dutch | NumberLocale::German => ('.', ','),
        }
    }
}

fn currency_symbol(code: &str) -> Option<&'static str> {
    match code {
        "EUR" => Some("€"),
        "USD" => Some("$"),
        "GBP" => Some("£"),
        "JPY" => Some("¥"),
        _ => None,
    }
}

fn minor_units(code: &str) -> u32 {
    match code {
        "JPY" => 0,
        _ => 2,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CurrencyFormatter {
    locale: NumberLocale,
}

impl CurrencyFormatter {
    pub fn new(locale: NumberLocale) -> Self {
        Self { locale }
    }

    pub fn format(&self, amount: f64, currency: &str) -> String {
        self.format_signed(amount, currency, false)
    }

    /// Format a comparison delta. Favorable deltas get an explicit `+`,
    /// unfavorable ones keep their natural minus.
    pub fn format_delta(&self, delta: f64, favorable: bool, currency: &str) -> String {
        self.format_signed(delta, currency, favorable)
    }

    fn format_signed(&self, amount: f64, currency: &str, force_sign: bool) -> String {
        let code = currency.trim().to_ascii_uppercase();
        let digits = minor_units(&code);
        let scaled = (amount.abs() * 10f64.powi(digits as i32)).round() as u64;

        // a value that rounds to zero never shows a minus
        let sign = if amount < 0.0 && scaled > 0 {
            "-"
        } else if force_sign {
            "+"
        } else {
            ""
        };

        let number = self.format_number(scaled, digits);
        let symbol = currency_symbol(&code);

        match self.locale {
            NumberLocale::English => match symbol {
                Some(symbol) => format!("{}{}{}", sign, symbol, number),
                None => format!("{}{} {}", sign, code, number),
            },
            NumberLocale::Dutch => format!("{} {}{}", symbol.unwrap_or(&code), sign, number),
            NumberLocale::German => format!("{}{} {}", sign, number, symbol.unwrap_or(&code)),
        }
    }

    fn format_number(&self, scaled: u64, digits: u32) -> String {
        let (group, decimal) = self.locale.separators();
        let factor = 10u64.pow(digits);
        let mut out = group_thousands(scaled / factor, group);
        if digits > 0 {
            out.push(decimal);
            out.push_str(&format!("{:0width$}", scaled % factor, width = digits as usize));
        }
        out
    }
}

fn group_thousands(value: u64, separator: char) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(ch);
    }
    out
}

/// `API Error (500): upstream down`, or `API Error: ...` without a status.
pub fn format_api_error(status: Option<u16>, detail: &str) -> String {
    match status {
        Some(status) => format!("API Error ({}): {}", status, detail),
        None => format!("API Error: {}", detail),
    }
}

pub struct ResponseFormatter {
    tags: Regex,
    whitespace: Regex,
}

impl Default for ResponseFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseFormatter {
    pub fn new() -> Self {
        Self {
            tags: Regex::new(r"<[^>]+>").expect("static regex"),
            whitespace: Regex::new(r"\s+").expect("static regex"),
        }
    }

    /// Squash a raw server detail (often an upstream HTML or JSON body)
    /// into a single readable line.
    pub fn compact_detail(&self, detail: &str) -> String {
        let without_tags = self.tags.replace_all(detail, " ");
        let collapsed = self.whitespace.replace_all(&without_tags, " ");
        let trimmed = collapsed.trim();

        if trimmed.chars().count() > 200 {
            let head: String = trimmed.chars().take(197).collect();
            format!("{}...", head)
        } else {
            trimmed.to_string()
        }
    }

    /// Render a JSON payload as indented `key: value` lines.
    pub fn format_json(&self, value: &Value) -> String {
        self.format_json_value(value, 0)
    }

    fn format_json_value(&self, value: &Value, indent_level: usize) -> String {
        let indent = "  ".repeat(indent_level);

        match value {
            Value::Object(map) => {
                if map.is_empty() {
                    return "{}".to_string();
                }

                map.iter()
                    .map(|(key, val)| match val {
                        Value::Object(inner) if !inner.is_empty() => {
                            format!("{}{}:\n{}", indent, key, self.format_json_value(val, indent_level + 1))
                        }
                        Value::Array(items) if !items.is_empty() => {
                            format!("{}{}:\n{}", indent, key, self.format_json_value(val, indent_level + 1))
                        }
                        _ => format!("{}{}: {}", indent, key, self.format_json_value(val, 0)),
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            Value::Array(arr) => {
                if arr.is_empty() {
                    return "[]".to_string();
                }

                arr.iter()
                    .map(|item| match item {
                        Value::Object(_) | Value::Array(_) => {
                            let body = self.format_json_value(item, indent_level + 1);
                            format!("{}-\n{}", indent, body)
                        }
                        _ => format!("{}- {}", indent, self.format_json_value(item, 0)),
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => "null".to_string(),
        }
    }

    pub fn format_error(&self, error: &str) -> String {
        format!("Error: {}", self.compact_detail(error))
    }
}
