//! Pulls a graphable equation out of free text and packages it for the
//! graphing calculator.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EquationForm {
    /// `f(x) = …`
    Function,
    /// `y = …`
    Explicit2d,
    /// `z = …`
    Surface,
    /// anything else with an `=`, e.g. `x^2 + y^2 = 25`
    Implicit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equation {
    pub form: EquationForm,
    pub lhs: String,
    pub rhs: String,
}

impl Equation {
    /// The string handed to the graphing widget.
    pub fn graph_expression(&self) -> String {
        match self.form {
            EquationForm::Function | EquationForm::Explicit2d => format!("y = {}", self.rhs),
            EquationForm::Surface => format!("z = {}", self.rhs),
            EquationForm::Implicit => format!("{} = {}", self.lhs, self.rhs),
        }
    }

    pub fn is_3d(&self) -> bool {
        self.form == EquationForm::Surface
    }
}

// Tried in order; the first match wins.
static PATTERNS: Lazy<Vec<(EquationForm, Regex)>> = Lazy::new(|| {
    [
        (EquationForm::Function, r"(f\s*\(\s*x\s*\))\s*=\s*([^\n,;=]+)"),
        (EquationForm::Explicit2d, r"\b(y)\s*=\s*([^\n,;=]+)"),
        (EquationForm::Surface, r"\b(z)\s*=\s*([^\n,;=]+)"),
        (EquationForm::Implicit, r"([^\n,;:=]+?)\s*=\s*([^\n,;=]+)"),
    ]
    .into_iter()
    .filter_map(|(form, pattern)| match Regex::new(pattern) {
        Ok(re) => Some((form, re)),
        Err(e) => {
            log::warn!("Skipping equation pattern {:?}: {}", pattern, e);
            None
        }
    })
    .collect()
});

/// Words allowed inside an expression besides runs of variable letters.
const MATH_WORDS: [&str; 20] = [
    "e", "pi", "π", "sin", "cos", "tan", "cot", "sec", "csc", "asin", "acos", "atan", "sinh",
    "cosh", "tanh", "log", "ln", "sqrt", "exp", "abs",
];

fn words(token: &str) -> impl Iterator<Item = String> + '_ {
    token
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

fn is_variables(word: &str) -> bool {
    word.chars().all(|c| matches!(c, 'x' | 'y' | 'z'))
}

/// `2x`, `sin(x)`, `+` and `25` are math; `Solve` and `if` are not.
fn is_math_token(token: &str) -> bool {
    words(token).all(|w| is_variables(&w) || MATH_WORDS.contains(&w.as_str()))
}

fn mentions_plane_variable(side: &str) -> bool {
    words(side).any(|w| is_variables(&w) && w.chars().any(|c| c != 'z'))
}

fn clean(side: &str) -> String {
    side.trim().trim_end_matches(['.', '?', '!']).trim().to_string()
}

/// Math tokens from the start of `side`, up to the first word of prose.
fn math_prefix(side: &str) -> String {
    let tokens: Vec<&str> = side
        .split_whitespace()
        .take_while(|t| is_math_token(t))
        .collect();
    clean(&tokens.join(" "))
}

/// Math tokens from the end of `side`, back to the last word of prose.
fn math_suffix(side: &str) -> String {
    let mut tokens: Vec<&str> = side
        .split_whitespace()
        .rev()
        .take_while(|t| is_math_token(t))
        .collect();
    tokens.reverse();
    clean(&tokens.join(" "))
}

pub fn extract_equation(text: &str) -> Option<Equation> {
    PATTERNS.iter().find_map(|(form, re)| {
        let caps = re.captures(text)?;
        let rhs = math_prefix(caps.get(2)?.as_str());
        if rhs.is_empty() {
            return None;
        }
        if *form != EquationForm::Implicit {
            let lhs = clean(caps.get(1)?.as_str());
            return Some(Equation {
                form: *form,
                lhs,
                rhs,
            });
        }

        // Prose in front of the `=` is dropped. Without a variable on the left
        // there is nothing implicit to draw, so the right side becomes `y = …`.
        let lhs = math_suffix(caps.get(1)?.as_str());
        if mentions_plane_variable(&lhs) {
            Some(Equation {
                form: EquationForm::Implicit,
                lhs,
                rhs,
            })
        } else {
            Some(Equation {
                form: EquationForm::Explicit2d,
                lhs: "y".to_string(),
                rhs,
            })
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Option<Self> {
        (min.is_finite() && max.is_finite() && min < max).then_some(Self { min, max })
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: -10.0,
            max: 10.0,
        }
    }
}

/// Everything the graphing widget needs to draw one equation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRequest {
    pub expression: String,
    pub three_d: bool,
    pub domain: Bounds,
    pub range: Bounds,
}

impl GraphRequest {
    pub fn new(equation: &Equation) -> Self {
        Self {
            expression: equation.graph_expression(),
            three_d: equation.is_3d(),
            domain: Bounds::default(),
            range: Bounds::default(),
        }
    }

    pub fn with_bounds(mut self, domain: Bounds, range: Bounds) -> Self {
        self.domain = domain;
        self.range = range;
        self
    }
}

/// Quick-pick equations offered next to the graph.
pub const PRESETS: [(&str, &str); 5] = [
    ("Quadratic", "y = x^2"),
    ("Cubic", "y = x^3"),
    ("Sine Wave", "y = sin(x)"),
    ("Circle", "x^2 + y^2 = 25"),
    ("Exponential", "y = e^x"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_notation_becomes_y() {
        let eq = extract_equation("Find the derivative of f(x) = x² + 2x").unwrap();
        assert_eq!(eq.form, EquationForm::Function);
        assert_eq!(eq.rhs, "x² + 2x");
        assert_eq!(eq.graph_expression(), "y = x² + 2x");
    }

    #[test]
    fn test_forms_in_priority_order() {
        let eq = extract_equation("Plot this: y = sin(x).").unwrap();
        assert_eq!((eq.form, eq.rhs.as_str()), (EquationForm::Explicit2d, "sin(x)"));

        let eq = extract_equation("z = sin(x) + cos(y)").unwrap();
        assert!(eq.is_3d());
        assert_eq!(eq.graph_expression(), "z = sin(x) + cos(y)");

        let eq = extract_equation("x^2 + y^2 = 25").unwrap();
        assert_eq!(eq.form, EquationForm::Implicit);
        assert_eq!(eq.lhs, "x^2 + y^2");
        assert_eq!(eq.graph_expression(), "x^2 + y^2 = 25");
    }

    #[test]
    fn test_no_equation() {
        assert!(extract_equation("What is a prime number?").is_none());
        assert!(extract_equation("y = ").is_none());
        assert!(extract_equation("Is it true that 2 + 2 = four?").is_none());
    }

    #[test]
    fn test_prose_around_implicit_equation_is_dropped() {
        let eq = extract_equation("Solve 2x + 3 = 7").unwrap();
        assert_eq!(eq.form, EquationForm::Implicit);
        assert_eq!(eq.graph_expression(), "2x + 3 = 7");
        assert!(!eq.graph_expression().contains("Solve"));

        let eq = extract_equation("Find x if 3x - 4 = 11 please").unwrap();
        assert_eq!(eq.graph_expression(), "3x - 4 = 11");

        let eq = extract_equation("Graph the circle x^2 + y^2 = 9 for me").unwrap();
        assert_eq!(eq.graph_expression(), "x^2 + y^2 = 9");
    }

    #[test]
    fn test_constant_left_side_graphs_the_right_side() {
        let eq = extract_equation("Check that 12 = 3x + 3").unwrap();
        assert_eq!(eq.form, EquationForm::Explicit2d);
        assert_eq!(eq.graph_expression(), "y = 3x + 3");

        let eq = extract_equation("Why is the answer = sqrt(x) here?").unwrap();
        assert_eq!(eq.graph_expression(), "y = sqrt(x)");
    }

    #[test]
    fn test_presets_all_extract() {
        for (_, preset) in PRESETS {
            let eq = extract_equation(preset).unwrap();
            assert_eq!(eq.graph_expression(), preset);
        }
    }

    #[test]
    fn test_graph_request_bounds() {
        let eq = extract_equation("y = x^3").unwrap();
        let request = GraphRequest::new(&eq);
        assert_eq!(request.domain, Bounds::default());
        assert!(!request.three_d);

        assert!(Bounds::new(5.0, -5.0).is_none());
        let wide = Bounds::new(-100.0, 100.0).unwrap();
        let request = request.with_bounds(wide, wide);
        assert_eq!(request.range.max, 100.0);
    }
}
