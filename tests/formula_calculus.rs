use std::collections::HashMap;

use approx::assert_relative_eq;
use formula_terms::{
    EvalEnvironment, Factor, FormulaError, MemoState, ModelDesc, Origin, Term, Value, INTERCEPT,
};
use nalgebra::DVector;

type Terms = &'static [&'static [&'static str]];

/// Formulas with no left-hand side: (formula, rhs intercept, rhs terms).
const RHS_CASES: &[(&str, bool, Terms)] = &[
    ("", true, &[]),
    (" ", true, &[]),
    (" \n ", true, &[]),
    ("a", true, &[&["a"]]),
    ("1", true, &[]),
    ("0", false, &[]),
    ("- 1", false, &[]),
    ("- 0", true, &[]),
    ("+ 1", true, &[]),
    ("+ 0", false, &[]),
    ("0 + 1", true, &[]),
    ("1 + 0", false, &[]),
    ("1 - 0", true, &[]),
    ("0 - 1", false, &[]),
    ("1 + a", true, &[&["a"]]),
    ("0 + a", false, &[&["a"]]),
    ("a - 1", false, &[&["a"]]),
    ("a - 0", true, &[&["a"]]),
    ("1 - a", true, &[]),
    ("a + b", true, &[&["a"], &["b"]]),
    ("(a + b)", true, &[&["a"], &["b"]]),
    ("a + ((((b))))", true, &[&["a"], &["b"]]),
    ("a + ((((+b))))", true, &[&["a"], &["b"]]),
    ("a + ((((b - a))))", true, &[&["a"], &["b"]]),
    ("a + a + a", true, &[&["a"]]),
    ("a + (b - a)", true, &[&["a"], &["b"]]),
    ("a + np.log(a, base=10)", true, &[&["a"], &["np.log(a, base=10)"]]),
    (
        "a + np.log(a, base=10) - np . log(a , base = 10)",
        true,
        &[&["a"]],
    ),
    ("a + (I(b) + c)", true, &[&["a"], &["I(b)"], &["c"]]),
    ("a + I(b + c)", true, &[&["a"], &["I(b + c)"]]),
    ("a:b", true, &[&["a", "b"]]),
    ("a:b:a", true, &[&["a", "b"]]),
    ("a:(b + c)", true, &[&["a", "b"], &["a", "c"]]),
    ("(a + b):c", true, &[&["a", "c"], &["b", "c"]]),
    ("a:(b - c)", true, &[&["a", "b"]]),
    ("c + a:c + a:(b - c)", true, &[&["c"], &["a", "c"], &["a", "b"]]),
    ("(a - b):c", true, &[&["a", "c"]]),
    ("b + b:c + (a - b):c", true, &[&["b"], &["b", "c"], &["a", "c"]]),
    ("a:b - a:b", true, &[]),
    ("a:b - b:a", true, &[]),
    ("1 - (a + b)", true, &[]),
    ("a + b - (a + b)", true, &[]),
    ("a * b", true, &[&["a"], &["b"], &["a", "b"]]),
    ("a * b * a", true, &[&["a"], &["b"], &["a", "b"]]),
    (
        "a * (b + c)",
        true,
        &[&["a"], &["b"], &["c"], &["a", "b"], &["a", "c"]],
    ),
    (
        "(a + b) * c",
        true,
        &[&["a"], &["b"], &["c"], &["a", "c"], &["b", "c"]],
    ),
    ("a * (b - c)", true, &[&["a"], &["b"], &["a", "b"]]),
    (
        "c + a:c + a * (b - c)",
        true,
        &[&["c"], &["a", "c"], &["a"], &["b"], &["a", "b"]],
    ),
    ("(a - b) * c", true, &[&["a"], &["c"], &["a", "c"]]),
    (
        "b + b:c + (a - b) * c",
        true,
        &[&["b"], &["b", "c"], &["a"], &["c"], &["a", "c"]],
    ),
    ("a/b", true, &[&["a"], &["a", "b"]]),
    ("(a + b)/c", true, &[&["a"], &["b"], &["a", "b", "c"]]),
    (
        "b + b:c + (a - b)/c",
        true,
        &[&["b"], &["b", "c"], &["a"], &["a", "c"]],
    ),
    ("a/(b + c)", true, &[&["a"], &["a", "b"], &["a", "c"]]),
    ("a ** 2", true, &[&["a"]]),
    ("(a + b) ** 99999999999999999999", true, &[&["a"], &["b"], &["a", "b"]]),
    (
        "(a + b + c + d) ** 2",
        true,
        &[
            &["a"],
            &["b"],
            &["c"],
            &["d"],
            &["a", "b"],
            &["a", "c"],
            &["a", "d"],
            &["b", "c"],
            &["b", "d"],
            &["c", "d"],
        ],
    ),
    (
        "(a + b + c + d) ** 3",
        true,
        &[
            &["a"],
            &["b"],
            &["c"],
            &["d"],
            &["a", "b"],
            &["a", "c"],
            &["a", "d"],
            &["b", "c"],
            &["b", "d"],
            &["c", "d"],
            &["a", "b", "c"],
            &["a", "b", "d"],
            &["a", "c", "d"],
            &["b", "c", "d"],
        ],
    ),
    ("a + +a", true, &[&["a"]]),
    ("~ a + b", true, &[&["a"], &["b"]]),
    ("~ a*b", true, &[&["a"], &["b"], &["a", "b"]]),
    ("~ a*b + 0", false, &[&["a"], &["b"], &["a", "b"]]),
    ("~ -1", false, &[]),
    ("0 ~ a + b", true, &[&["a"], &["b"]]),
    // Precedence.
    ("a + b * c", true, &[&["a"], &["b"], &["c"], &["b", "c"]]),
    ("a * b + c", true, &[&["a"], &["b"], &["a", "b"], &["c"]]),
    ("a * b - a", true, &[&["b"], &["a", "b"]]),
    ("a + b / c", true, &[&["a"], &["b"], &["b", "c"]]),
    ("a / b + c", true, &[&["a"], &["a", "b"], &["c"]]),
    ("a*b:c", true, &[&["a"], &["b", "c"], &["a", "b", "c"]]),
    ("a:b*c", true, &[&["a", "b"], &["c"], &["a", "b", "c"]]),
    // Intercept handling.
    ("~ 1 + 1 + 0 + 1", true, &[]),
    ("~ 0 + 1 + 0", false, &[]),
    ("~ 0 - 1 - 1 + 0 + 1", true, &[]),
    ("~ 1 - 1", false, &[]),
    ("~ 0 + a + 1", true, &[&["a"]]),
    ("~ 1 + (a + 0)", true, &[&["a"]]),
    ("~ 0 + (a + 1)", true, &[&["a"]]),
    ("~ 1 - (a + 1)", false, &[]),
];

/// Two-sided formulas: (formula, lhs intercept, lhs terms, rhs intercept, rhs terms).
const TWO_SIDED_CASES: &[(&str, bool, Terms, bool, Terms)] = &[
    ("1 ~ a + b", true, &[], true, &[&["a"], &["b"]]),
    ("y ~ a + b", false, &[&["y"]], true, &[&["a"], &["b"]]),
    ("0 + y ~ a + b", false, &[&["y"]], true, &[&["a"], &["b"]]),
    (
        "0 + y * z ~ a + b",
        false,
        &[&["y"], &["z"], &["y", "z"]],
        true,
        &[&["a"], &["b"]],
    ),
    ("-1 ~ 1", false, &[], true, &[]),
    ("1 + y ~ a + b", true, &[&["y"]], true, &[&["a"], &["b"]]),
];

/// `<` and `>` mark the span the error must point at.
const ERROR_CASES: &[&str] = &[
    "a <+>",
    "a + <(>",
    "b + <(-a)>",
    "a:<1>",
    "(a + <1>)*b",
    "a + <2>",
    "a + <1.0>",
    "a ** <b>",
    "a ** <(1 + 1)>",
    "a ** <1.5>",
    "a + b <# asdf>",
    "<)>",
    "a + <)>",
    "<*> a",
    "a + <*>",
    "a + <foo[bar>",
    "a + <foo{bar>",
    "a + <foo(bar>",
    "a + <[bar>",
    "a + <{bar>",
    "a + <{bar[]>",
    "a + foo<]>bar",
    "a + foo[]<]>bar",
    "a + foo{}<}>bar",
    "a + foo<)>bar",
    "a + b<)>",
    "(a) <.>",
    "<(>a + b",
    "<y ~ a> ~ b",
    "y ~ <(a ~ b)>",
    "<~ a> ~ b",
    "~ <(a ~ b)>",
    "1 + <-(a + b)>",
    "<- a>",
    "a + <-a**2>",
];

fn describe_terms(terms: &[Term]) -> Vec<Vec<String>> {
    terms
        .iter()
        .map(|term| term.factors().iter().map(|f| f.name().to_string()).collect())
        .collect()
}

fn assert_terms_match(code: &str, side: &str, terms: &[Term], intercept: bool, expected: Terms) {
    let mut wanted: Vec<Vec<String>> = Vec::new();
    if intercept {
        wanted.push(Vec::new());
    }
    wanted.extend(
        expected
            .iter()
            .map(|factors| factors.iter().map(|s| s.to_string()).collect()),
    );
    assert_eq!(describe_terms(terms), wanted, "{side} of {code:?}");
    if intercept {
        assert_eq!(terms[0], INTERCEPT, "{side} of {code:?}");
    }
}

fn model(code: &str) -> ModelDesc {
    ModelDesc::from_formula(code, &EvalEnvironment::new())
        .unwrap_or_else(|err| panic!("{code:?} failed: {}", err.display_with_origin()))
}

fn all_formulas() -> impl Iterator<Item = &'static str> {
    RHS_CASES
        .iter()
        .map(|case| case.0)
        .chain(TWO_SIDED_CASES.iter().map(|case| case.0))
}

#[test]
fn one_sided_formulas() {
    for &(code, rhs_intercept, rhs) in RHS_CASES {
        let desc = model(code);
        assert_terms_match(code, "lhs", desc.lhs_termlist(), false, &[]);
        assert_terms_match(code, "rhs", desc.rhs_termlist(), rhs_intercept, rhs);
    }
}

#[test]
fn two_sided_formulas() {
    for &(code, lhs_intercept, lhs, rhs_intercept, rhs) in TWO_SIDED_CASES {
        let desc = model(code);
        assert_terms_match(code, "lhs", desc.lhs_termlist(), lhs_intercept, lhs);
        assert_terms_match(code, "rhs", desc.rhs_termlist(), rhs_intercept, rhs);
    }
}

#[test]
fn errors_point_at_the_offending_span() {
    for marked in ERROR_CASES {
        let start = marked.find('<').unwrap();
        let end = marked.find('>').unwrap() - 1;
        let code = marked.replacen('<', "", 1).replacen('>', "", 1);

        let err = match ModelDesc::from_formula(&code, &EvalEnvironment::new()) {
            Ok(desc) => panic!("{code:?} unexpectedly gave {desc}"),
            Err(err) => err,
        };
        let origin = err
            .origin()
            .unwrap_or_else(|| panic!("{code:?} error has no origin: {err}"));
        assert_eq!(
            (origin.start, origin.end),
            (start, end),
            "{marked:?}: {}",
            err.display_with_origin()
        );
    }
}

#[test]
fn errors_are_classified() {
    let env = EvalEnvironment::new();
    let kind = |code: &str| ModelDesc::from_formula(code, &env).unwrap_err();
    assert!(matches!(kind("a + 2"), FormulaError::InvalidLiteral { .. }));
    assert!(matches!(kind("a ** 1.5"), FormulaError::InvalidLiteral { .. }));
    assert!(matches!(kind("a ** 0"), FormulaError::InvalidLiteral { .. }));
    assert!(matches!(kind("a ** (1 + 1)"), FormulaError::InvalidLiteral { .. }));
    assert!(matches!(kind("- a"), FormulaError::InvalidUnaryMinus { .. }));
    assert!(matches!(kind("a:1"), FormulaError::InterceptInteraction { .. }));
    assert!(matches!(kind("(a + 1)/b"), FormulaError::InterceptInteraction { .. }));
    assert!(matches!(kind("(1 + a)**2"), FormulaError::InterceptInteraction { .. }));
    assert!(matches!(kind("y ~ (a ~ b)"), FormulaError::MisplacedSeparator { .. }));
    assert!(matches!(kind("a + (b"), FormulaError::Parse { .. }));
}

#[test]
fn factor_origins_point_into_the_formula() {
    let desc = model("a + b");
    let origin_of = |index: usize| desc.rhs_termlist()[index].factors()[0].origin().cloned();
    assert_eq!(origin_of(1), Some(Origin::new("a + b", 0, 1)));
    assert_eq!(origin_of(2), Some(Origin::new("a + b", 4, 5)));
}

#[test]
fn describe_is_a_fixed_point() {
    for code in all_formulas() {
        let described = model(code).describe();
        let again = model(&described);
        assert_eq!(again.describe(), described, "{code:?}");
        assert_eq!(again, model(code), "{code:?}");
    }
}

#[test]
fn describe_examples() {
    assert_eq!(model("y ~ a + b").describe(), "y ~ a + b");
    assert_eq!(model("1 + y ~ 0 + a").describe(), "1 + y ~ 0 + a");
    assert_eq!(model("~ 0").describe(), "~ 0");
    assert_eq!(model("").describe(), "~ 1");
    assert_eq!(model("(a + b)/c").describe(), "~ a + b + a:b:c");
}

#[test]
fn embedded_expressions_evaluate_against_data() {
    let env = EvalEnvironment::new().with_variable("scale", Value::Scalar(10.0));
    let desc = ModelDesc::from_formula("y ~ I(x) + Q('odd name') + scale", &env).unwrap();

    let mut data = HashMap::new();
    data.insert("y".to_string(), DVector::from_vec(vec![0.5, 1.5]));
    data.insert("x".to_string(), DVector::from_vec(vec![1.0, 2.0]));
    data.insert("odd name".to_string(), DVector::from_vec(vec![7.0, 8.0]));

    let state = MemoState::new();
    let values: Vec<Value> = desc.rhs_termlist()[1..]
        .iter()
        .map(|term| term.factors()[0].evaluate(&state, &data).unwrap())
        .collect();

    match &values[0] {
        Value::Column(column) => assert_relative_eq!(column[1], 2.0),
        other => panic!("unexpected {other:?}"),
    }
    match &values[1] {
        Value::Column(column) => assert_relative_eq!(column[0], 7.0),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(values[2], Value::Scalar(10.0));

    let y = desc.lhs_termlist()[0].factors()[0].evaluate(&state, &data).unwrap();
    assert_eq!(y, Value::Column(DVector::from_vec(vec![0.5, 1.5])));
}

#[test]
fn builtins_can_be_left_out() {
    let options = formula_terms::FormulaOptions::default().with_builtins(false);
    let desc =
        ModelDesc::from_formula_with_options("~ I(x)", &EvalEnvironment::new(), &options).unwrap();
    let mut data = HashMap::new();
    data.insert("x".to_string(), DVector::from_vec(vec![1.0]));
    let err = desc.rhs_termlist()[1].factors()[0]
        .evaluate(&MemoState::new(), &data)
        .unwrap_err();
    assert!(matches!(err, FormulaError::UnknownName { .. }));
    assert_eq!(err.origin().map(|o| (o.start, o.end)), Some((2, 6)));
}

#[test]
fn descriptions_are_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ModelDesc>();
    assert_send_sync::<Term>();

    let desc = std::sync::Arc::new(model("y ~ a*b"));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let desc = desc.clone();
            std::thread::spawn(move || desc.describe())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), "y ~ a + b + a:b");
    }
}
