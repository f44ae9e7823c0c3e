use ariadne::{Color, Fmt, Label, Report, ReportKind, Source};
use chumsky::prelude::*;

use crate::factor::Cost;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Statement {
    Invalid,
    Empty,
    VarDecl {
        name: String,
        dim: usize,
    },
    Dense {
        vars: Vec<String>,
        costs: Vec<Cost>,
    },
    Sparse {
        vars: Vec<String>,
        states: Vec<(Vec<usize>, Cost)>,
    },
}

fn parser() -> impl Parser<char, Vec<Statement>, Error = Simple<char>> {
    let pad = just(' ').or(just('\t')).repeated();
    let space = pad.at_least(1);
    let op = |c| just(c).delimited_by(pad, pad);
    let ident = pad.ignore_then(text::ident()).then_ignore(pad);
    let kw = |s| text::keyword::<_, _, Simple<char>>(s).delimited_by(pad, space);
    let uint = || {
        text::int(10)
            .try_map(|s: String, span| {
                s.parse::<usize>()
                    .map_err(|e| Simple::custom(span, format!("Invalid integer {}: {}", s, e)))
            })
            .delimited_by(pad, pad)
    };
    let number = || {
        let frac = just('.').chain(text::digits(10));
        let exp = just('e')
            .or(just('E'))
            .chain(just('+').or(just('-')).or_not())
            .chain::<char, _, _>(text::digits(10));
        just('-')
            .or_not()
            .chain::<char, _, _>(text::int(10))
            .chain::<char, _, _>(frac.or_not().flatten())
            .chain::<char, _, _>(exp.or_not().flatten())
            .collect::<String>()
            .try_map(|s, span| {
                s.parse::<Cost>()
                    .map_err(|e| Simple::custom(span, format!("Invalid number {}: {}", s, e)))
            })
            .delimited_by(pad, pad)
    };
    let vars = ident.repeated().at_least(1);
    let comment = || op('#').then_ignore(filter(|c| *c != '\n' && *c != '\r').repeated());
    let var_decl = kw("VAR")
        .ignore_then(ident)
        .then(uint())
        .map(|(name, dim)| Statement::VarDecl { name, dim });
    let costs = number()
        .separated_by(op(','))
        .allow_trailing()
        .delimited_by(op('['), op(']'));
    let dense = kw("DENSE")
        .ignore_then(vars)
        .then_ignore(op('='))
        .then(costs)
        .map(|(vars, costs)| Statement::Dense { vars, costs });
    let state = uint()
        .separated_by(op(','))
        .at_least(1)
        .allow_trailing()
        .delimited_by(op('('), op(')'));
    let special_states = state
        .then_ignore(op(':'))
        .then(number())
        .separated_by(op(','))
        .allow_trailing()
        .delimited_by(op('{'), op('}'));
    let sparse = kw("SPARSE")
        .ignore_then(vars)
        .then_ignore(op('='))
        .then(special_states)
        .map(|(vars, states)| Statement::Sparse { vars, states });
    // A blank line must really end here, so that a broken statement is
    // reported where it breaks rather than as an unexpected first token.
    let empty = pad
        .at_least(0)
        .then_ignore(comment().or_not())
        .then_ignore(text::newline().or(end()).rewind())
        .to(Statement::Empty);
    var_decl
        .or(dense)
        .or(sparse)
        .or(empty)
        .then_ignore(comment().or_not())
        .recover_with(skip_until(['\n', '\r'], |_| Statement::Invalid))
        .separated_by(text::newline())
        .allow_leading()
        .allow_trailing()
        .then_ignore(end())
}

/// Parse a problem description. On failure, the error is the rendered report
/// of every syntax error.
pub(super) fn parse(src: &str) -> Result<Vec<Statement>, String> {
    let (stmts, errs) = parser().parse_recovery_verbose(src);
    if errs.is_empty() {
        return stmts.ok_or_else(|| "Empty parse result.".to_owned());
    }
    let mut err_str = Vec::new();
    for e in errs {
        let msg = if let chumsky::error::SimpleReason::Custom(msg) = e.reason() {
            msg.clone()
        } else {
            format!(
                "Unexpected token, expected {}",
                if e.expected().len() == 0 {
                    "something else".to_string()
                } else {
                    e.expected()
                        .map(|expected| match expected {
                            Some(expected) => format!("{:?}", expected),
                            None => "end of input".to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(", ")
                },
            )
        };
        let label = match e.reason() {
            chumsky::error::SimpleReason::Custom(msg) => msg.clone(),
            _ => format!(
                "Unexpected {}",
                e.found()
                    .map(|c| format!("token {}", format!("{:?}", c).fg(Color::Red)))
                    .unwrap_or_else(|| "end of input".to_string())
            ),
        };
        let report = Report::build(ReportKind::Error, (), e.span().start)
            .with_message(&msg)
            .with_label(Label::new(e.span()).with_message(label).with_color(Color::Red))
            .finish();
        if report.write(Source::from(src), &mut err_str).is_err() {
            err_str.extend_from_slice(msg.as_bytes());
            err_str.push(b'\n');
        }
    }
    Err(String::from_utf8_lossy(&err_str).into_owned())
}
