use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Capacity of a freshly created array; growth doubles from here.
pub const ARRAY_INITIAL_CAPACITY: usize = 4;

/// Runtime value. The variant is fixed at construction: arithmetic and
/// conversions always build a new `Value`.
///
/// Strings are immutable shared text. Arrays are shared, interior-mutable
/// buffers, so every register or global holding the same array observes
/// appends and element writes made through any of them.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Nil,
    Str(Rc<str>),
    Array(Rc<RefCell<Array>>),
    Range(Range),
}

impl Value {
    pub fn int(n: i64) -> Self {
        Value::Int(n)
    }

    pub fn float(f: f64) -> Self {
        Value::Float(f)
    }

    pub fn boolean(b: bool) -> Self {
        Value::Bool(b)
    }

    pub fn string(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    pub fn array(items: Array) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn empty_array() -> Self {
        Value::array(Array::new())
    }

    pub fn range(start: i64, end: i64, step: i64) -> Self {
        Value::Range(Range::new(start, end, step))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Nil => "nil",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Range(_) => "range",
        }
    }

    /// Nil and false are falsy, integers are falsy at zero. Every other value,
    /// including `0.0` and empty containers, is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            _ => true,
        }
    }

    pub fn to_number(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Element access shared by arrays and ranges. Anything else, a
    /// non-integer index, or an index outside the container yields Nil.
    pub fn element(&self, index: &Value) -> Value {
        let Value::Int(i) = index else {
            return Value::Nil;
        };
        match self {
            Value::Array(items) => items.borrow().get(*i),
            Value::Range(r) => r.get(*i),
            _ => Value::Nil,
        }
    }

    /// Array size, string character count, or range length; 0 otherwise.
    pub fn length(&self) -> i64 {
        match self {
            Value::Array(items) => items.borrow().len() as i64,
            Value::Str(s) => s.chars().count() as i64,
            Value::Range(r) => r.len(),
            _ => 0,
        }
    }
}

/// Language-level `==`: only same-variant integers, floats and strings can be
/// equal. Mixed variants (including `1 == 1.0`) and every other kind compare
/// false.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        _ => false,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", format_general(*n)),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Nil => write!(f, "nil"),
            Value::Str(s) => write!(f, "{}", s),
            Value::Array(items) => write!(f, "[array:{}]", items.borrow().len()),
            // Ranges have no printed form of their own
            Value::Range(_) => write!(f, "nil"),
        }
    }
}

/// `%g`-style rendering: six significant digits, trailing zeros dropped,
/// exponent form below 1e-4 and from 1e6 upwards.
pub fn format_general(n: f64) -> String {
    const PRECISION: i32 = 6;

    if n.is_nan() {
        return "nan".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if n == 0.0 {
        return if n.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let sci = format!("{:.*e}", (PRECISION - 1) as usize, n);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);

    if exp < -4 || exp >= PRECISION {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exp.abs())
    } else {
        let decimals = (PRECISION - 1 - exp) as usize;
        trim_fraction(&format!("{:.*}", decimals, n)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

// ── Array ────────────────────────────────────────────────────────────

/// Growable value buffer. Capacity starts at 4 and doubles when full.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    items: Vec<Value>,
}

impl Array {
    pub fn new() -> Self {
        Array { items: Vec::with_capacity(ARRAY_INITIAL_CAPACITY) }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    pub fn push(&mut self, value: Value) {
        if self.items.len() == self.items.capacity() {
            let grow = self.items.capacity().max(ARRAY_INITIAL_CAPACITY);
            self.items.reserve_exact(grow);
        }
        self.items.push(value);
    }

    /// Nil for negative or past-the-end indices.
    pub fn get(&self, index: i64) -> Value {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.items.get(i))
            .cloned()
            .unwrap_or(Value::Nil)
    }

    /// Overwrites an existing slot. Returns false (and changes nothing) when
    /// the index is out of range; arrays never grow through `set`.
    pub fn set(&mut self, index: i64, value: Value) -> bool {
        match usize::try_from(index).ok().and_then(|i| self.items.get_mut(i)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }
}

impl Default for Array {
    fn default() -> Self {
        Array::new()
    }
}

impl FromIterator<Value> for Array {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let mut arr = Array::new();
        for v in iter {
            arr.push(v);
        }
        arr
    }
}

// ── Range ────────────────────────────────────────────────────────────

/// Lazy arithmetic progression `start, start+step, ...` stopping before `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: i64,
    pub end: i64,
    pub step: i64,
}

impl Range {
    pub fn new(start: i64, end: i64, step: i64) -> Self {
        Range { start, end, step }
    }

    /// `max(0, ceil((end - start) / step))`; a zero step is empty.
    pub fn len(&self) -> i64 {
        if self.step == 0 {
            return 0;
        }
        // i128 keeps `end - start` exact for the whole i64 domain.
        let span = self.end as i128 - self.start as i128;
        let step = self.step as i128;
        let mut n = span / step;
        let rem = span % step;
        if rem != 0 && (rem > 0) == (step > 0) {
            n += 1;
        }
        n.clamp(0, i64::MAX as i128) as i64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `start + index * step` while that stays short of `end`. Negative
    /// indices are not rejected: they walk back from `start`.
    pub fn get(&self, index: i64) -> Value {
        let v = self.start as i128 + index as i128 * self.step as i128;
        let in_bounds = match self.step {
            0 => false,
            s if s > 0 => v < self.end as i128,
            _ => v > self.end as i128,
        };
        match i64::try_from(v) {
            Ok(v) if in_bounds => Value::Int(v),
            _ => Value::Nil,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Int(-3).is_truthy());
        // Only integers have a numeric falsy value.
        assert!(Value::Float(0.0).is_truthy());
        assert!(Value::string("").is_truthy());
        assert!(Value::empty_array().is_truthy());
        assert!(Value::range(0, 0, 1).is_truthy());
    }

    #[test]
    fn to_number_guards_non_numeric() {
        assert_eq!(Value::Int(7).to_number(), Some(7.0));
        assert_eq!(Value::Float(2.5).to_number(), Some(2.5));
        assert_eq!(Value::Bool(true).to_number(), None);
        assert_eq!(Value::string("3").to_number(), None);
        assert_eq!(Value::Nil.to_number(), None);
    }

    #[test]
    fn equality_is_same_variant_only() {
        assert!(values_equal(&Value::Int(3), &Value::Int(3)));
        assert!(!values_equal(&Value::Int(3), &Value::Float(3.0)));
        assert!(values_equal(&Value::Float(0.5), &Value::Float(0.5)));
        assert!(values_equal(&Value::string("ab"), &Value::string("ab")));
        assert!(!values_equal(&Value::string("ab"), &Value::string("ba")));
        assert!(!values_equal(&Value::Bool(true), &Value::Bool(true)));
        assert!(!values_equal(&Value::Nil, &Value::Nil));
    }

    #[test]
    fn array_grows_by_doubling() {
        let mut arr = Array::new();
        assert!(arr.capacity() >= ARRAY_INITIAL_CAPACITY);
        for i in 0..5 {
            arr.push(Value::Int(i));
            assert!(arr.capacity() >= arr.len());
        }
        assert_eq!(arr.len(), 5);
        assert!(arr.capacity() >= 8);
    }

    #[test]
    fn array_get_out_of_range_is_nil() {
        let arr: Array = (0..3).map(Value::Int).collect();
        assert_eq!(arr.get(0), Value::Int(0));
        assert_eq!(arr.get(2), Value::Int(2));
        assert_eq!(arr.get(3), Value::Nil);
        assert_eq!(arr.get(-1), Value::Nil);
        assert_eq!(Array::new().get(0), Value::Nil);
    }

    #[test]
    fn array_set_in_bounds_only() {
        let mut arr: Array = (0..2).map(Value::Int).collect();
        assert!(arr.set(1, Value::string("x")));
        assert_eq!(arr.get(1), Value::string("x"));
        assert!(!arr.set(2, Value::Nil));
        assert!(!arr.set(-1, Value::Nil));
        assert_eq!(arr.len(), 2);
    }

    #[test]
    fn shared_array_sees_appends() {
        let a = Value::empty_array();
        let b = a.clone();
        if let Value::Array(items) = &a {
            items.borrow_mut().push(Value::Int(1));
        }
        assert_eq!(b.length(), 1);
    }

    #[test]
    fn range_length_and_elements() {
        let r = Range::new(0, 5, 1);
        assert_eq!(r.len(), 5);
        assert_eq!(r.get(0), Value::Int(0));
        assert_eq!(r.get(4), Value::Int(4));
        assert_eq!(r.get(5), Value::Nil);
    }

    #[test]
    fn range_negative_index_walks_back_from_start() {
        let r = Range::new(0, 3, 1);
        assert_eq!(r.get(-1), Value::Int(-1));
        assert_eq!(r.get(-100), Value::Int(-100));
        assert_eq!(Range::new(5, 0, -1).get(-2), Value::Int(7));
        assert_eq!(Range::new(0, 3, 0).get(0), Value::Nil);
        assert_eq!(Range::new(0, i64::MAX, 1).get(i64::MIN), Value::Int(i64::MIN));
        assert_eq!(Range::new(-1, i64::MAX, 2).get(i64::MIN), Value::Nil);
    }

    #[test]
    fn range_mechanics_hold_for_random_bounds() {
        for _ in 0..200 {
            let n = fastrand::i64(0..10_000);
            let r = Range::new(0, n, 1);
            assert_eq!(r.len(), n);
            if n > 0 {
                let i = fastrand::i64(0..n);
                assert_eq!(r.get(i), Value::Int(i));
            }
            assert_eq!(r.get(n), Value::Nil);
            assert_eq!(r.get(n + fastrand::i64(0..1000)), Value::Nil);
        }
    }

    #[test]
    fn array_mechanics_hold_for_random_sizes() {
        for _ in 0..100 {
            let n = fastrand::usize(0..300);
            let mut arr = Array::new();
            for i in 0..n {
                arr.push(Value::Int(i as i64));
            }
            assert_eq!(arr.len(), n);
            assert!(arr.capacity() >= n);
            if n > 0 {
                let i = fastrand::usize(0..n);
                assert_eq!(arr.get(i as i64), Value::Int(i as i64));
            }
            assert_eq!(arr.get(n as i64), Value::Nil);
            assert_eq!(arr.get(-fastrand::i64(1..1000)), Value::Nil);
        }
    }

    #[test]
    fn range_length_rounds_up() {
        assert_eq!(Range::new(0, 10, 3).len(), 4);
        assert_eq!(Range::new(0, 10, 3).get(3), Value::Int(9));
        assert_eq!(Range::new(2, 3, 5).len(), 1);
    }

    #[test]
    fn range_degenerate_cases() {
        assert_eq!(Range::new(0, 0, 1).len(), 0);
        assert_eq!(Range::new(5, 0, 1).len(), 0);
        assert_eq!(Range::new(0, 5, 0).len(), 0);
        assert_eq!(Range::new(0, -3, 1).len(), 0);
        assert_eq!(Range::new(5, 0, -2).len(), 3);
    }

    #[test]
    fn length_dispatch() {
        assert_eq!(Value::string("héllo").length(), 5);
        assert_eq!(Value::range(0, 4, 1).length(), 4);
        assert_eq!(Value::Int(9).length(), 0);
        assert_eq!(Value::Nil.length(), 0);
    }

    #[test]
    fn element_requires_integer_index() {
        let r = Value::range(0, 3, 1);
        assert_eq!(r.element(&Value::Int(1)), Value::Int(1));
        assert_eq!(r.element(&Value::Int(-1)), Value::Int(-1));
        assert_eq!(r.element(&Value::Float(1.0)), Value::Nil);
        assert_eq!(Value::string("abc").element(&Value::Int(0)), Value::Nil);
    }

    #[test]
    fn general_float_format() {
        assert_eq!(format_general(3.5), "3.5");
        assert_eq!(format_general(4.0), "4");
        assert_eq!(format_general(0.1 + 0.2), "0.3");
        assert_eq!(format_general(100000.0), "100000");
        assert_eq!(format_general(1234567.0), "1.23457e+06");
        assert_eq!(format_general(1e20), "1e+20");
        assert_eq!(format_general(0.0001), "0.0001");
        assert_eq!(format_general(0.00001234), "1.234e-05");
        assert_eq!(format_general(-2.25), "-2.25");
        assert_eq!(format_general(f64::INFINITY), "inf");
        assert_eq!(format_general(f64::NEG_INFINITY), "-inf");
        assert_eq!(format_general(f64::NAN), "nan");
        assert_eq!(format_general(0.0), "0");
    }

    #[test]
    fn display_formats() {
        assert_eq!(Value::Int(-12).to_string(), "-12");
        assert_eq!(Value::Float(3.5).to_string(), "3.5");
        assert_eq!(Value::string("raw text").to_string(), "raw text");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Bool(false).to_string(), "false");
        assert_eq!(Value::Nil.to_string(), "nil");
        let arr: Array = (0..3).map(Value::Int).collect();
        assert_eq!(Value::array(arr).to_string(), "[array:3]");
        assert_eq!(Value::range(0, 7, 1).to_string(), "nil");
    }
}
