//! Rule sources in TOML.
//!
//! A rule file declares the signature a calculus works over and the taclets
//! of the calculus. Several files can be loaded into one [`RuleLoader`];
//! later files see everything earlier files declared.
//!
//! ```toml
//! problem = "p(c) ==> p(c)"
//!
//! [[sorts]]
//! name = "int"
//!
//! [[predicates]]
//! name = "p"
//! args = ["int"]
//!
//! [[schema_variables]]
//! name = "phi"
//! kind = "formula"
//!
//! [[taclets]]
//! name = "close"
//! find = "==> phi"
//! assumes = "phi ==>"
//! rule_sets = ["closure"]
//! goals = []
//! ```
//!
//! A `find` containing `==>` is a sequent with a single formula and makes an
//! antecedent or succedent taclet; any other `find` is a rewrite pattern.
//! `replacewith` follows the same convention. Goal templates may name
//! `[[templates]]` in `addrules`; templates are never applied directly.
//!
//! Every error names the file and the declaration it stems from.
use std::{collections::BTreeMap, path::Path, sync::Arc};

use log::{debug, info};
use petgraph::{algo::toposort, graph::DiGraph};
use serde::Deserialize;
use sqlogic::{
    op::{Function, ModalityKind, SchemaVariable, SvKind},
    parser::{parse_sequent, parse_sort, parse_term},
    sequent::Sequent,
    services::Services,
    sort::{Sort, SortDeclaration, Variance},
    term::Term,
};

use crate::{
    rules::{
        ApplicationRestriction, ExternalVerdictRule, GoalTemplate, RuleBase, Taclet, TruthTableSolver,
        VariableCondition, varcond::SortRelation,
    },
    utils::error::{ProofError, ProofResult},
};

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RuleFile {
    problem: Option<String>,
    sorts: Vec<SortDecl>,
    generic_sorts: Vec<GenericSortDecl>,
    parametric_sorts: Vec<ParametricSortDecl>,
    functions: Vec<FunctionDecl>,
    predicates: Vec<PredicateDecl>,
    program_variables: Vec<ProgramVariableDecl>,
    schema_variables: Vec<SchemaVariableDecl>,
    templates: Vec<TacletDecl>,
    taclets: Vec<TacletDecl>,
    builtins: Vec<BuiltinDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SortDecl {
    name: String,
    #[serde(default)]
    extends: Vec<String>,
    #[serde(default, rename = "abstract")]
    is_abstract: bool,
    doc: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GenericSortDecl {
    name: String,
    #[serde(default)]
    extends: Vec<String>,
    #[serde(default)]
    one_of: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParametricSortDecl {
    name: String,
    params: Vec<SortParam>,
    #[serde(default)]
    extends: Vec<String>,
    doc: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SortParam {
    name: String,
    #[serde(default)]
    variance: VarianceDecl,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum VarianceDecl {
    #[default]
    Invariant,
    Covariant,
    Contravariant,
}

impl From<VarianceDecl> for Variance {
    fn from(v: VarianceDecl) -> Self {
        match v {
            VarianceDecl::Invariant => Variance::Invariant,
            VarianceDecl::Covariant => Variance::Covariant,
            VarianceDecl::Contravariant => Variance::Contravariant,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FunctionDecl {
    name: String,
    sort: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default = "rigid_default")]
    rigid: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PredicateDecl {
    name: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default = "rigid_default")]
    rigid: bool,
}

fn rigid_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProgramVariableDecl {
    name: String,
    sort: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SvKindDecl {
    Formula,
    Term,
    StrictTerm,
    Variable,
    Skolem,
    Update,
    ProgramVariable,
    Expression,
    Statement,
    StatementList,
    Modality,
    Label,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaVariableDecl {
    name: String,
    kind: SvKindDecl,
    sort: Option<String>,
    #[serde(default)]
    rigid: bool,
    #[serde(default)]
    modalities: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TacletDecl {
    name: String,
    find: Option<String>,
    assumes: Option<String>,
    #[serde(default)]
    goals: Vec<GoalDecl>,
    #[serde(default)]
    varcond: Vec<VarCondDecl>,
    #[serde(default)]
    restrictions: Vec<String>,
    #[serde(default)]
    rule_sets: Vec<String>,
    doc: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct GoalDecl {
    label: Option<String>,
    replacewith: Option<String>,
    add: Option<String>,
    addrules: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VarCondDecl {
    kind: String,
    args: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BuiltinDecl {
    name: String,
    solver: String,
    max_atoms: Option<usize>,
    #[serde(default)]
    rule_sets: Vec<String>,
}

/// Outcome of loading: the environment, the rule base and the problem of
/// the last file that stated one.
pub struct LoadedRules {
    pub services: Services,
    pub rules: Arc<RuleBase>,
    pub problem: Option<Sequent>,
}

pub struct RuleLoader {
    services: Services,
    rules: RuleBase,
    problem: Option<Sequent>,
}

impl RuleLoader {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            rules: RuleBase::new(),
            problem: None,
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn rules(&self) -> &RuleBase {
        &self.rules
    }

    pub fn problem(&self) -> Option<&Sequent> {
        self.problem.as_ref()
    }

    pub fn finish(self) -> LoadedRules {
        info!("Loaded {} rules.", self.rules.len());
        LoadedRules {
            services: self.services,
            rules: Arc::new(self.rules),
            problem: self.problem,
        }
    }

    pub fn load_file(&mut self, path: &Path) -> ProofResult<()> {
        let text = std::fs::read_to_string(path)?;
        self.load_str(&path.display().to_string(), &text)
    }

    /// Loads the rule source `text`; `file` names it in errors.
    pub fn load_str(&mut self, file: &str, text: &str) -> ProofResult<()> {
        let decls: RuleFile = toml::from_str(text).map_err(|e| ProofError::input(file, "syntax", e.message()))?;
        let ctx = FileContext {
            file,
            services: &self.services,
        };

        ctx.declare_sorts(&decls.sorts)?;
        for g in &decls.generic_sorts {
            let extends: Vec<&str> = g.extends.iter().map(String::as_str).collect();
            let one_of: Vec<&str> = g.one_of.iter().map(String::as_str).collect();
            self.services
                .sorts()
                .declare_generic(&g.name, &extends, &one_of)
                .map_err(|e| ctx.error(format!("generic sort {}", g.name), e))?;
        }
        for p in &decls.parametric_sorts {
            let params: Vec<(&str, Variance)> = p.params.iter().map(|q| (q.name.as_str(), q.variance.into())).collect();
            let extends: Vec<&str> = p.extends.iter().map(String::as_str).collect();
            self.services
                .sorts()
                .declare_parametric(&p.name, &params, &extends, p.doc.clone())
                .map_err(|e| ctx.error(format!("parametric sort {}", p.name), e))?;
        }
        for f in &decls.functions {
            let item = format!("function {}", f.name);
            let sort = ctx.sort(&item, &f.sort)?;
            ctx.declare_function(&item, &f.name, sort, &f.args, f.rigid)?;
        }
        for p in &decls.predicates {
            let item = format!("predicate {}", p.name);
            ctx.declare_function(&item, &p.name, Sort::formula(), &p.args, p.rigid)?;
        }
        for pv in &decls.program_variables {
            let item = format!("program variable {}", pv.name);
            let sort = ctx.sort(&item, &pv.sort)?;
            self.services
                .declare_program_variable(&pv.name, sort)
                .map_err(|e| ctx.error(&item, e))?;
        }
        for sv in &decls.schema_variables {
            ctx.declare_schema_variable(sv)?;
        }

        for t in &decls.templates {
            let taclet = ctx.taclet(t, &self.rules)?;
            ctx.check_unique(&self.rules, &t.name)?;
            self.rules.add_template(taclet)?;
        }
        for t in &decls.taclets {
            let taclet = ctx.taclet(t, &self.rules)?;
            ctx.check_unique(&self.rules, &t.name)?;
            self.rules.add_taclet(taclet)?;
        }
        for b in &decls.builtins {
            let item = format!("builtin {}", b.name);
            ctx.check_unique(&self.rules, &b.name)?;
            let solver = match b.solver.as_str() {
                "truth_table" => b
                    .max_atoms
                    .map_or_else(TruthTableSolver::default, TruthTableSolver::with_max_atoms),
                other => return Err(ProofError::input(file, item, format!("unknown solver `{other}`"))),
            };
            let mut rule = ExternalVerdictRule::new(b.name.as_str(), Arc::new(solver));
            for set in &b.rule_sets {
                rule = rule.in_rule_set(set.as_str());
            }
            self.rules.add_builtin(Arc::new(rule))?;
        }

        if let Some(problem) = &decls.problem {
            let sequent = parse_sequent(&self.services, problem).map_err(|e| ctx.error("problem", e))?;
            self.problem = Some(sequent);
        }
        debug!(
            "Loaded `{file}`: {} sorts, {} functions, {} taclets.",
            decls.sorts.len() + decls.generic_sorts.len() + decls.parametric_sorts.len(),
            decls.functions.len() + decls.predicates.len(),
            decls.templates.len() + decls.taclets.len()
        );
        Ok(())
    }
}

struct FileContext<'a> {
    file: &'a str,
    services: &'a Services,
}

impl FileContext<'_> {
    fn error(&self, item: impl Into<String>, message: impl ToString) -> ProofError {
        ProofError::input(self.file, item, message)
    }

    fn sort(&self, item: &str, name: &str) -> ProofResult<Sort> {
        parse_sort(self.services, name).map_err(|e| self.error(item, e))
    }

    /// Declares `sorts` parents first; parents may also come from earlier files.
    fn declare_sorts(&self, sorts: &[SortDecl]) -> ProofResult<()> {
        let mut graph = DiGraph::<usize, ()>::new();
        let nodes: Vec<_> = (0..sorts.len()).map(|i| graph.add_node(i)).collect();
        let index: BTreeMap<&str, usize> = sorts.iter().enumerate().map(|(i, s)| (s.name.as_str(), i)).collect();
        if index.len() != sorts.len() {
            let dup = sorts
                .iter()
                .enumerate()
                .find(|(i, s)| index.get(s.name.as_str()) != Some(i))
                .map_or("", |(_, s)| s.name.as_str());
            return Err(self.error(format!("sort {dup}"), "declared twice"));
        }
        for (i, s) in sorts.iter().enumerate() {
            for parent in &s.extends {
                if let Some(&p) = index.get(parent.as_str()) {
                    graph.add_edge(nodes[p], nodes[i], ());
                }
            }
        }
        let order = toposort(&graph, None).map_err(|cycle| {
            let s = &sorts[graph[cycle.node_id()]];
            self.error(format!("sort {}", s.name), "cyclic sort hierarchy")
        })?;
        for n in order {
            let s = &sorts[graph[n]];
            let mut decl = SortDeclaration::new(&s.name)
                .extending(s.extends.iter().cloned())
                .set_abstract(s.is_abstract)
                .with_origin(self.file);
            if let Some(doc) = &s.doc {
                decl = decl.documented(doc.clone());
            }
            self.services
                .sorts()
                .declare(decl)
                .map_err(|e| self.error(format!("sort {}", s.name), e))?;
        }
        Ok(())
    }

    fn declare_function(&self, item: &str, name: &str, sort: Sort, args: &[String], rigid: bool) -> ProofResult<()> {
        let args = args.iter().map(|a| self.sort(item, a)).collect::<ProofResult<Vec<_>>>()?;
        let mut f = Function::new(name, sort, args);
        if !rigid {
            f = f.non_rigid();
        }
        self.services.declare_function(f).map_err(|e| self.error(item, e))?;
        Ok(())
    }

    fn declare_schema_variable(&self, decl: &SchemaVariableDecl) -> ProofResult<()> {
        let item = format!("schema variable {}", decl.name);
        let sort = match &decl.sort {
            Some(s) => self.sort(&item, s)?,
            None => match decl.kind {
                SvKindDecl::Term | SvKindDecl::StrictTerm | SvKindDecl::Variable | SvKindDecl::Skolem => {
                    return Err(self.error(item, "a sort is required for this kind"));
                }
                _ => Sort::any(),
            },
        };
        let kind = match decl.kind {
            SvKindDecl::Formula => SvKind::Formula,
            SvKindDecl::Term => SvKind::Term { strict: false },
            SvKindDecl::StrictTerm => SvKind::Term { strict: true },
            SvKindDecl::Variable => SvKind::Variable,
            SvKindDecl::Skolem => SvKind::Skolem,
            SvKindDecl::Update => SvKind::Update,
            SvKindDecl::ProgramVariable => SvKind::ProgramVariable,
            SvKindDecl::Expression => SvKind::Expression,
            SvKindDecl::Statement => SvKind::Statement,
            SvKindDecl::StatementList => SvKind::StatementList,
            SvKindDecl::Label => SvKind::Label,
            SvKindDecl::Modality => {
                let mut kinds = Vec::new();
                for m in &decl.modalities {
                    kinds.push(match m.as_str() {
                        "diamond" => ModalityKind::Diamond,
                        "box" => ModalityKind::Box,
                        other => return Err(self.error(item, format!("unknown modality `{other}`"))),
                    });
                }
                if kinds.is_empty() {
                    kinds.extend([ModalityKind::Diamond, ModalityKind::Box]);
                }
                SvKind::Modality(kinds.into_iter().collect())
            }
        };
        let sv = if decl.rigid {
            SchemaVariable::rigid(decl.name.as_str(), kind, sort)
        } else {
            SchemaVariable::new(decl.name.as_str(), kind, sort)
        };
        self.services
            .declare_schema_variable(sv)
            .map_err(|e| self.error(item, e))?;
        Ok(())
    }

    fn check_unique(&self, rules: &RuleBase, name: &str) -> ProofResult<()> {
        if rules.taclet(name).is_some() || rules.template(name).is_some() || rules.builtin(name).is_some() {
            return Err(self.error(format!("rule {name}"), "a rule with this name already exists"));
        }
        Ok(())
    }

    fn sequent(&self, item: &str, part: &str, text: &str) -> ProofResult<Sequent> {
        parse_sequent(self.services, text).map_err(|e| self.error(format!("{item}: {part}"), e))
    }

    fn term(&self, item: &str, part: &str, text: &str) -> ProofResult<Term> {
        parse_term(self.services, text).map_err(|e| self.error(format!("{item}: {part}"), e))
    }

    fn schema_variable(&self, item: &str, name: &str) -> ProofResult<Arc<SchemaVariable>> {
        self.services
            .schema_variable(name)
            .ok_or_else(|| self.error(item, format!("unknown schema variable `{name}`")))
    }

    fn taclet(&self, decl: &TacletDecl, rules: &RuleBase) -> ProofResult<Taclet> {
        let item = format!("taclet {}", decl.name);
        let mut builder = Taclet::builder(decl.name.as_str());

        if let Some(find) = &decl.find {
            if find.contains("==>") {
                let s = self.sequent(&item, "find", find)?;
                let mut formulas = s.iter();
                let (Some((side, _, f)), None) = (formulas.next(), formulas.next()) else {
                    return Err(self.error(item, "find must contain exactly one formula"));
                };
                builder = builder.find_formula(side, f.formula().clone());
            } else {
                builder = builder.find_term(self.term(&item, "find", find)?);
            }
        }
        if let Some(assumes) = &decl.assumes {
            builder = builder.assumes(self.sequent(&item, "assumes", assumes)?);
        }

        for (i, g) in decl.goals.iter().enumerate() {
            let part = g.label.clone().unwrap_or_else(|| format!("goal {i}"));
            let mut goal = GoalTemplate::new();
            if let Some(label) = &g.label {
                goal = goal.labeled(label.clone());
            }
            if let Some(r) = &g.replacewith {
                goal = if r.contains("==>") {
                    goal.replace_sequent(self.sequent(&item, &part, r)?)
                } else {
                    goal.replace_term(self.term(&item, &part, r)?)
                };
            }
            if let Some(add) = &g.add {
                goal = goal.add(self.sequent(&item, &part, add)?);
            }
            for name in &g.addrules {
                let template = rules
                    .template(name)
                    .ok_or_else(|| self.error(format!("{item}: {part}"), format!("unknown template `{name}` in addrules")))?;
                goal = goal.add_rule(template.clone());
            }
            builder = builder.goal(goal);
        }

        for c in &decl.varcond {
            builder = builder.varcond(self.varcond(&item, c)?);
        }
        for r in &decl.restrictions {
            let flag = ApplicationRestriction::from_config_name(r)
                .ok_or_else(|| self.error(&item, format!("unknown restriction `{r}`")))?;
            builder = builder.restriction(flag);
        }
        for set in &decl.rule_sets {
            builder = builder.rule_set(set.as_str());
        }
        if let Some(doc) = &decl.doc {
            builder = builder.doc(doc.clone());
        }
        builder.build().map_err(|e| match e {
            ProofError::InvariantViolation(message) => self.error(item, message),
            other => other,
        })
    }

    fn varcond(&self, item: &str, decl: &VarCondDecl) -> ProofResult<VariableCondition> {
        let arity = match decl.kind.as_str() {
            "is_rigid" => 1,
            "not_free_in" | "different" | "same_sort" | "sub_sort" | "force_equal" | "force_generic_sort" => 2,
            "drop_effectless" | "apply_update_on_rigid" => 3,
            other => return Err(self.error(item, format!("unknown variable condition `{other}`"))),
        };
        if decl.args.len() != arity {
            return Err(self.error(
                item,
                format!("`{}` takes {arity} arguments, got {}", decl.kind, decl.args.len()),
            ));
        }
        if decl.kind == "force_generic_sort" {
            let generic = self.sort(item, &decl.args[0])?;
            if !generic.is_generic() {
                return Err(self.error(item, format!("`{generic}` is not a generic sort")));
            }
            return Ok(VariableCondition::ForceGenericSort {
                generic,
                sv: self.schema_variable(item, &decl.args[1])?,
            });
        }
        let svs = decl
            .args
            .iter()
            .map(|a| self.schema_variable(item, a))
            .collect::<ProofResult<Vec<_>>>()?;
        let sv = |i: usize| svs[i].clone();
        Ok(match decl.kind.as_str() {
            "is_rigid" => VariableCondition::IsRigid(sv(0)),
            "not_free_in" => VariableCondition::NotFreeIn { var: sv(0), term: sv(1) },
            "different" => VariableCondition::Different(sv(0), sv(1)),
            "same_sort" | "sub_sort" => VariableCondition::SortCompatible {
                left: sv(0),
                right: sv(1),
                relation: if decl.kind == "same_sort" {
                    SortRelation::Same
                } else {
                    SortRelation::Sub
                },
            },
            "force_equal" => VariableCondition::ForceEqual {
                target: sv(0),
                source: sv(1),
            },
            "drop_effectless" => VariableCondition::DropEffectlessElementaries {
                update: sv(0),
                target: sv(1),
                result: sv(2),
            },
            _ => VariableCondition::ApplyUpdateOnRigid {
                update: sv(0),
                target: sv(1),
                result: sv(2),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNATURE: &str = r#"
        [[sorts]]
        name = "nat"
        extends = ["int"]

        [[sorts]]
        name = "int"

        [[functions]]
        name = "zero"
        sort = "nat"

        [[predicates]]
        name = "even"
        args = ["int"]

        [[schema_variables]]
        name = "n"
        kind = "term"
        sort = "int"
    "#;

    #[test]
    fn parents_are_declared_first() {
        let mut loader = RuleLoader::new(Services::default());
        loader.load_str("sig.toml", SIGNATURE).unwrap();
        let services = loader.services();
        let nat = services.sort("nat").unwrap();
        let int = services.sort("int").unwrap();
        assert!(nat.extends_trans(&int));
        assert!(parse_term(services, "even(zero)").is_ok());
    }

    #[test]
    fn cycles_name_a_sort() {
        let text = r#"
            [[sorts]]
            name = "a"
            extends = ["b"]
            [[sorts]]
            name = "b"
            extends = ["a"]
        "#;
        let err = RuleLoader::new(Services::default()).load_str("cyc.toml", text).unwrap_err();
        let ProofError::ProofInput { file, item, message } = err else {
            panic!("unexpected error {err}");
        };
        assert_eq!(file, "cyc.toml");
        assert!(item.starts_with("sort "));
        assert!(message.contains("cyclic"));
    }

    #[test]
    fn rewrite_and_sequent_finds() {
        let text = r#"
            [[taclets]]
            name = "evenRewrite"
            find = "even(n)"
            goals = [{ replacewith = "true" }]

            [[taclets]]
            name = "evenLeft"
            find = "even(n) ==>"
            goals = [{ add = "==> even(n)" }]
            rule_sets = ["alpha"]
        "#;
        let mut loader = RuleLoader::new(Services::default());
        loader.load_str("sig.toml", SIGNATURE).unwrap();
        loader.load_str("rules.toml", text).unwrap();
        let rules = loader.finish().rules;
        assert!(rules.taclet("evenRewrite").unwrap().kind().is_rewrite());
        let left = rules.taclet("evenLeft").unwrap();
        assert!(left.kind().is_antecedent());
        assert!(left.in_rule_set("alpha"));
    }

    #[test]
    fn unknown_template_is_reported() {
        let text = r#"
            [[taclets]]
            name = "remember"
            find = "even(n) ==>"
            goals = [{ addrules = ["missing"] }]
        "#;
        let mut loader = RuleLoader::new(Services::default());
        loader.load_str("sig.toml", SIGNATURE).unwrap();
        let err = loader.load_str("rules.toml", text).unwrap_err();
        assert!(err.to_string().contains("missing"));
        assert!(err.is_proof_input());
    }
}
