//! Brace-style text templates for cell titles and text boxes
//!
//! `{name}` is replaced by the record field `name`; `{name:spec}` applies a
//! format spec of the form `[[fill]align][sign][0][width][.precision][type]`
//! with `align` one of `<>^=` and `type` one of `d f F e E g G s %`.
//! `{{` and `}}` produce literal braces.

use crate::error::{PanelError, PanelResult};
use crate::types::FieldValue;
use std::collections::BTreeMap;

/// Render `template` against `values`
pub fn format_template(template: &str, values: &BTreeMap<String, FieldValue>) -> PanelResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut field = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    if c == '{' {
                        return Err(PanelError::format(format!(
                            "nested replacement fields are not supported in '{}'",
                            template
                        )));
                    }
                    field.push(c);
                }
                if !closed {
                    return Err(PanelError::format(format!(
                        "unmatched '{{' in '{}'",
                        template
                    )));
                }
                out.push_str(&render_field(&field, values)?);
            }
            '}' => {
                return Err(PanelError::format(format!(
                    "single '}}' encountered in '{}'",
                    template
                )))
            }
            c => out.push(c),
        }
    }

    Ok(out)
}

fn render_field(field: &str, values: &BTreeMap<String, FieldValue>) -> PanelResult<String> {
    let (head, spec) = match field.split_once(':') {
        Some((head, spec)) => (head, spec),
        None => (field, ""),
    };
    let (name, conversion) = match head.split_once('!') {
        Some((name, conv)) => (name, Some(conv)),
        None => (head, None),
    };

    let name = name.trim();
    if name.is_empty() {
        return Err(PanelError::format(
            "positional replacement fields are not supported; name the field",
        ));
    }

    let value = values
        .get(name)
        .ok_or_else(|| PanelError::format(format!("unknown field '{}'", name)))?;

    let value = match conversion {
        None | Some("s") => value.clone(),
        Some("r") => match value {
            FieldValue::Text(s) => FieldValue::Text(format!("'{}'", s)),
            other => other.clone(),
        },
        Some(other) => {
            return Err(PanelError::format(format!(
                "unknown conversion '!{}' for field '{}'",
                other, name
            )))
        }
    };

    let spec = FormatSpec::parse(spec)?;
    spec.apply(&value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
    Center,
    AfterSign,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct FormatSpec {
    fill: Option<char>,
    align: Option<Align>,
    sign: Option<char>,
    zero: bool,
    width: usize,
    precision: Option<usize>,
    kind: Option<char>,
}

fn align_of(c: char) -> Option<Align> {
    match c {
        '<' => Some(Align::Left),
        '>' => Some(Align::Right),
        '^' => Some(Align::Center),
        '=' => Some(Align::AfterSign),
        _ => None,
    }
}

impl FormatSpec {
    fn parse(spec: &str) -> PanelResult<Self> {
        let chars: Vec<char> = spec.chars().collect();
        let mut out = FormatSpec::default();
        let mut i = 0;

        if chars.len() >= 2 && align_of(chars[1]).is_some() {
            out.fill = Some(chars[0]);
            out.align = align_of(chars[1]);
            i = 2;
        } else if let Some(align) = chars.first().and_then(|c| align_of(*c)) {
            out.align = Some(align);
            i = 1;
        }

        if let Some(&c) = chars.get(i) {
            if c == '+' || c == '-' || c == ' ' {
                out.sign = Some(c);
                i += 1;
            }
        }

        if chars.get(i) == Some(&'0') {
            out.zero = true;
            i += 1;
        }

        let start = i;
        while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
            i += 1;
        }
        if i > start {
            out.width = chars[start..i].iter().collect::<String>().parse().unwrap_or(0);
        }

        if chars.get(i) == Some(&'.') {
            i += 1;
            let start = i;
            while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
                i += 1;
            }
            if i == start {
                return Err(PanelError::format(format!("missing precision in spec '{}'", spec)));
            }
            out.precision = chars[start..i].iter().collect::<String>().parse().ok();
        }

        if let Some(&c) = chars.get(i) {
            if !"dfFeEgGs%".contains(c) {
                return Err(PanelError::format(format!(
                    "unknown format code '{}' in spec '{}'",
                    c, spec
                )));
            }
            out.kind = Some(c);
            i += 1;
        }

        if i != chars.len() {
            return Err(PanelError::format(format!("invalid format spec '{}'", spec)));
        }
        Ok(out)
    }

    fn apply(&self, value: &FieldValue) -> PanelResult<String> {
        let numeric = !matches!(value, FieldValue::Text(_));
        let body = match (self.kind, value) {
            (Some('d'), FieldValue::Int(v)) => self.signed(*v < 0, v.unsigned_abs().to_string()),
            (Some('d'), other) => {
                return Err(PanelError::format(format!(
                    "format code 'd' requires an integer, got '{}'",
                    other
                )))
            }
            (Some(kind @ ('f' | 'F' | 'e' | 'E' | 'g' | 'G' | '%')), v) => {
                let x = v.as_f64().ok_or_else(|| {
                    PanelError::format(format!("format code '{}' requires a number, got '{}'", kind, v))
                })?;
                self.signed(is_negative(x), self.float_digits(kind, x.abs()))
            }
            (None, FieldValue::Float(x)) if self.precision.is_some() => {
                self.signed(is_negative(*x), self.float_digits('g', x.abs()))
            }
            (None, FieldValue::Int(v)) | (Some('s'), FieldValue::Int(v)) => {
                self.signed(*v < 0, v.unsigned_abs().to_string())
            }
            (_, FieldValue::Text(s)) => match self.precision {
                Some(p) => s.chars().take(p).collect(),
                None => s.clone(),
            },
            (_, v) => {
                let text = v.to_string();
                match text.strip_prefix('-') {
                    Some(rest) => self.signed(true, rest.to_string()),
                    None => self.signed(false, text),
                }
            }
        };
        Ok(self.pad(body, numeric))
    }

    fn signed(&self, negative: bool, digits: String) -> String {
        let prefix = match (negative, self.sign) {
            (true, _) => "-",
            (false, Some('+')) => "+",
            (false, Some(' ')) => " ",
            _ => "",
        };
        format!("{}{}", prefix, digits)
    }

    fn float_digits(&self, kind: char, x: f64) -> String {
        if !x.is_finite() {
            let word = if x.is_nan() { "nan" } else { "inf" };
            return match kind {
                'F' | 'E' | 'G' => word.to_uppercase(),
                '%' => format!("{}%", word),
                _ => word.to_string(),
            };
        }
        let precision = self.precision.unwrap_or(6);
        match kind {
            'f' | 'F' => format!("{:.*}", precision, x),
            'e' | 'E' => {
                let s = scientific(x, precision);
                if kind == 'E' { s.to_uppercase() } else { s }
            }
            '%' => format!("{:.*}%", precision, x * 100.0),
            _ => {
                let s = general(x, precision.max(1));
                if kind == 'G' { s.to_uppercase() } else { s }
            }
        }
    }

    fn pad(&self, body: String, numeric: bool) -> String {
        let len = body.chars().count();
        if len >= self.width {
            return body;
        }
        let missing = self.width - len;

        let (fill, align) = match (self.align, self.zero) {
            (Some(align), _) => (self.fill.unwrap_or(' '), align),
            (None, true) if numeric => ('0', Align::AfterSign),
            (None, _) => (' ', if numeric { Align::Right } else { Align::Left }),
        };
        let fill_str = |n: usize| fill.to_string().repeat(n);

        match align {
            Align::Left => format!("{}{}", body, fill_str(missing)),
            Align::Right => format!("{}{}", fill_str(missing), body),
            Align::Center => {
                let left = missing / 2;
                format!("{}{}{}", fill_str(left), body, fill_str(missing - left))
            }
            Align::AfterSign => {
                let split = body
                    .chars()
                    .next()
                    .filter(|c| matches!(c, '+' | '-' | ' '))
                    .map_or(0, |c| c.len_utf8());
                format!("{}{}{}", &body[..split], fill_str(missing), &body[split..])
            }
        }
    }
}

fn is_negative(x: f64) -> bool {
    x.is_sign_negative() && x != 0.0 && !x.is_nan()
}

/// `1.500000e+02` style exponent notation
fn scientific(x: f64, precision: usize) -> String {
    let raw = format!("{:.*e}", precision, x);
    match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        }
        None => raw,
    }
}

/// General format: fixed or exponent notation depending on magnitude, with
/// trailing zeros removed
fn general(x: f64, precision: usize) -> String {
    if x == 0.0 {
        return "0".to_string();
    }
    if !x.is_finite() {
        return x.to_string();
    }
    let rounded = format!("{:.*e}", precision - 1, x);
    let exp: i32 = rounded
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);

    if exp < -4 || exp >= precision as i32 {
        let s = scientific(x, precision - 1);
        match s.split_once('e') {
            Some((mantissa, exp)) => format!("{}e{}", strip_zeros(mantissa), exp),
            None => s,
        }
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        strip_zeros(&format!("{:.*}", decimals, x))
    }
}

fn strip_zeros(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}
