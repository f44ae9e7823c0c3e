use indexmap::IndexMap;
use thiserror::Error;

use crate::factor::{FactorSpec, SpecialState};
use crate::fg_parser::Statement;
use crate::Problem;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DescriptionError {
    #[error("Variable {0} is declared more than once.")]
    MultipleVarDecl(String),
    #[error("Variable {0} is not declared.")]
    UnknownVar(String),
}

/// A problem built from a text description, with the declared variable names
/// (indexed like the variables of the problem).
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedProblem {
    pub names: Vec<String>,
    pub problem: Problem,
}

/// Variables are numbered in declaration order, which may come after their
/// first use in a factor.
pub(super) fn build_problem(stmts: &[Statement]) -> Result<ParsedProblem, DescriptionError> {
    let mut vars: IndexMap<&str, usize> = IndexMap::new();
    for stmt in stmts {
        if let Statement::VarDecl { name, dim } = stmt {
            if vars.insert(name.as_str(), *dim).is_some() {
                return Err(DescriptionError::MultipleVarDecl(name.clone()));
            }
        }
    }
    let var_ids = |names: &[String]| -> Result<Vec<usize>, DescriptionError> {
        names
            .iter()
            .map(|name| {
                vars.get_index_of(name.as_str())
                    .ok_or_else(|| DescriptionError::UnknownVar(name.clone()))
            })
            .collect()
    };
    let mut factors = Vec::new();
    for stmt in stmts {
        match stmt {
            Statement::Dense { vars, costs } => {
                factors.push(FactorSpec::dense(var_ids(vars)?, costs.clone()));
            }
            Statement::Sparse { vars, states } => {
                let states = states
                    .iter()
                    .map(|(assignment, cost)| SpecialState::new(assignment.clone(), *cost))
                    .collect();
                factors.push(FactorSpec::sparse(var_ids(vars)?, states));
            }
            Statement::VarDecl { .. } | Statement::Empty | Statement::Invalid => {}
        }
    }
    Ok(ParsedProblem {
        names: vars.keys().map(|name| (*name).to_owned()).collect(),
        problem: Problem {
            cardinalities: vars.values().copied().collect(),
            factors,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fg_parser;

    fn build(src: &str) -> Result<ParsedProblem, DescriptionError> {
        build_problem(&fg_parser::parse(src).unwrap())
    }

    #[test]
    fn declaration_order() {
        let parsed = build("DENSE b a = [0, 1, 2, 3]\nVAR a 2\nVAR b 2\nSPARSE a = {(1): -1}\n")
            .unwrap();
        assert_eq!(parsed.names, vec!["a", "b"]);
        assert_eq!(parsed.problem.cardinalities, vec![2, 2]);
        assert_eq!(
            parsed.problem.factors,
            vec![
                FactorSpec::dense(vec![1, 0], vec![0.0, 1.0, 2.0, 3.0]),
                FactorSpec::sparse(vec![0], vec![SpecialState::new(vec![1], -1.0)]),
            ]
        );
    }

    #[test]
    fn name_errors() {
        assert_eq!(
            build("VAR a 2\nVAR a 3\n").unwrap_err(),
            DescriptionError::MultipleVarDecl("a".to_owned())
        );
        assert_eq!(
            build("VAR a 2\nDENSE a c = [0, 0, 0, 0]\n").unwrap_err(),
            DescriptionError::UnknownVar("c".to_owned())
        );
    }
}
