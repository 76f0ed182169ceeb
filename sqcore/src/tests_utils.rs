//! Fixtures shared by unit and integration tests.
//!
//! [`FIRST_ORDER_RULES`] is a small first-order calculus with updates and a
//! few symbolic execution rules, written as a rule file so that loading it
//! exercises the loader as well.
use std::sync::Arc;

use sqlogic::{parser::parse_sequent, services::Services};

use crate::{
    loader::RuleLoader,
    proof::Proof,
    rules::RuleBase,
};

pub const FIRST_ORDER_RULES: &str = r##"
[[sorts]]
name = "int"

[[sorts]]
name = "boolean"

[[functions]]
name = "add"
sort = "int"
args = ["int", "int"]

[[functions]]
name = "sub"
sort = "int"
args = ["int", "int"]

[[functions]]
name = "mul"
sort = "int"
args = ["int", "int"]

[[functions]]
name = "neg"
sort = "int"
args = ["int"]

[[functions]]
name = "c"
sort = "int"

[[functions]]
name = "d"
sort = "int"

[[functions]]
name = "TRUE"
sort = "boolean"

[[predicates]]
name = "lt"
args = ["int", "int"]

[[predicates]]
name = "leq"
args = ["int", "int"]

[[predicates]]
name = "gt"
args = ["int", "int"]

[[predicates]]
name = "geq"
args = ["int", "int"]

[[predicates]]
name = "p"
args = ["int"]

[[predicates]]
name = "q"

[[predicates]]
name = "r"

[[program_variables]]
name = "i"
sort = "int"

[[program_variables]]
name = "j"
sort = "int"

[[program_variables]]
name = "b"
sort = "boolean"

[[schema_variables]]
name = "phi"
kind = "formula"

[[schema_variables]]
name = "psi"
kind = "formula"

[[schema_variables]]
name = "t"
kind = "term"
sort = "int"

[[schema_variables]]
name = "s"
kind = "term"
sort = "int"

[[schema_variables]]
name = "x"
kind = "variable"
sort = "int"

[[schema_variables]]
name = "sk"
kind = "skolem"
sort = "int"

[[schema_variables]]
name = "u"
kind = "update"

[[schema_variables]]
name = "#v"
kind = "program_variable"
sort = "int"

[[schema_variables]]
name = "#se"
kind = "expression"
sort = "int"

[[schema_variables]]
name = "#sc"
kind = "expression"
sort = "Formula"

[[schema_variables]]
name = "#slist"
kind = "statement_list"

[[schema_variables]]
name = "#s1"
kind = "statement_list"

[[schema_variables]]
name = "#s2"
kind = "statement_list"

[[schema_variables]]
name = "#m"
kind = "modality"
modalities = ["diamond", "box"]

# closure

[[taclets]]
name = "close"
find = "==> phi"
assumes = "phi ==>"
rule_sets = ["closure"]
doc = "A formula on both sides closes the goal."

[[taclets]]
name = "closeTrue"
find = "==> true"
rule_sets = ["closure"]

[[taclets]]
name = "closeFalse"
find = "false ==>"
rule_sets = ["closure"]

[[taclets]]
name = "eqRefl"
find = "t = t"
goals = [{ replacewith = "true" }]
rule_sets = ["closure"]

# propositional, non-splitting

[[taclets]]
name = "andLeft"
find = "phi & psi ==>"
goals = [{ replacewith = "phi, psi ==>" }]
rule_sets = ["alpha"]

[[taclets]]
name = "orRight"
find = "==> phi | psi"
goals = [{ replacewith = "==> phi, psi" }]
rule_sets = ["alpha"]

[[taclets]]
name = "impRight"
find = "==> phi -> psi"
goals = [{ replacewith = "phi ==> psi" }]
rule_sets = ["alpha"]

[[taclets]]
name = "notLeft"
find = "!phi ==>"
goals = [{ replacewith = "==> phi" }]
rule_sets = ["alpha"]

[[taclets]]
name = "notRight"
find = "==> !phi"
goals = [{ replacewith = "phi ==>" }]
rule_sets = ["alpha"]

[[taclets]]
name = "trueLeft"
find = "true ==>"
goals = [{ replacewith = "==>" }]
rule_sets = ["alpha"]

[[taclets]]
name = "falseRight"
find = "==> false"
goals = [{ replacewith = "==>" }]
rule_sets = ["alpha"]

# propositional, splitting

[[taclets]]
name = "andRight"
find = "==> phi & psi"
rule_sets = ["beta"]

[[taclets.goals]]
label = "left"
replacewith = "==> phi"

[[taclets.goals]]
label = "right"
replacewith = "==> psi"

[[taclets]]
name = "orLeft"
find = "phi | psi ==>"
rule_sets = ["beta"]

[[taclets.goals]]
label = "left"
replacewith = "phi ==>"

[[taclets.goals]]
label = "right"
replacewith = "psi ==>"

[[taclets]]
name = "impLeft"
find = "phi -> psi ==>"
rule_sets = ["beta"]

[[taclets.goals]]
label = "premise"
replacewith = "==> phi"

[[taclets.goals]]
label = "conclusion"
replacewith = "psi ==>"

[[taclets]]
name = "equivRight"
find = "==> phi <-> psi"
rule_sets = ["beta"]

[[taclets.goals]]
label = "forward"
replacewith = "phi ==> psi"

[[taclets.goals]]
label = "backward"
replacewith = "psi ==> phi"

# quantifiers

[[taclets]]
name = "allRight"
find = "==> \\forall x; phi"
goals = [{ replacewith = "==> {\\subst x; sk}phi" }]
rule_sets = ["delta"]

[[taclets]]
name = "exLeft"
find = "\\exists x; phi ==>"
goals = [{ replacewith = "{\\subst x; sk}phi ==>" }]
rule_sets = ["delta"]

[[taclets]]
name = "allLeft"
find = "\\forall x; phi ==>"
goals = [{ add = "{\\subst x; t}phi ==>" }]
rule_sets = ["gamma"]

[[taclets]]
name = "exRight"
find = "==> \\exists x; phi"
goals = [{ add = "==> {\\subst x; t}phi" }]
rule_sets = ["gamma"]

# updates

[[taclets]]
name = "applySkip"
find = "{\\skip}phi"
goals = [{ replacewith = "phi" }]
rule_sets = ["update"]

[[taclets]]
name = "applyElementaryOnPV"
find = "{#v := t}#v"
goals = [{ replacewith = "t" }]
rule_sets = ["update"]

[[taclets]]
name = "dropEffectless"
find = "{u}phi"
goals = [{ replacewith = "psi" }]
rule_sets = ["update"]

[[taclets.varcond]]
kind = "drop_effectless"
args = ["u", "phi", "psi"]

[[taclets]]
name = "applyOnRigid"
find = "{u}phi"
goals = [{ replacewith = "psi" }]
rule_sets = ["update"]

[[taclets.varcond]]
kind = "apply_update_on_rigid"
args = ["u", "phi", "psi"]

[[taclets]]
name = "applyOnRigidTerm"
find = "{u}t"
goals = [{ replacewith = "s" }]
rule_sets = ["update"]

[[taclets.varcond]]
kind = "apply_update_on_rigid"
args = ["u", "t", "s"]

# symbolic execution

[[taclets]]
name = "assignment"
find = "\\modality{#m}{ #v = #se; #slist; }\\endmodality phi"
goals = [{ replacewith = "{#v := #se}\\modality{#m}{ #slist; }\\endmodality phi" }]
rule_sets = ["symex"]

[[taclets]]
name = "skipStatement"
find = "\\modality{#m}{ skip; #slist; }\\endmodality phi"
goals = [{ replacewith = "\\modality{#m}{ #slist; }\\endmodality phi" }]
rule_sets = ["symex"]

[[taclets]]
name = "emptyModality"
find = "\\modality{#m}{ }\\endmodality phi"
goals = [{ replacewith = "phi" }]
rule_sets = ["symex"]

[[taclets]]
name = "ifElseSplit"
find = "\\modality{#m}{ if (#sc) { #s1; } else { #s2; } #slist; }\\endmodality phi"
restrictions = ["same_update_level", "succedent_polarity"]
rule_sets = ["symex"]

[[taclets.goals]]
label = "then"
replacewith = "\\modality{#m}{ #s1; #slist; }\\endmodality phi"
add = "#sc ==>"

[[taclets.goals]]
label = "else"
replacewith = "\\modality{#m}{ #s2; #slist; }\\endmodality phi"
add = "==> #sc"

# interactive only

[[taclets]]
name = "cut"
doc = "Case distinction on an arbitrary formula."

[[taclets.goals]]
label = "true"
add = "phi ==>"

[[taclets.goals]]
label = "false"
add = "==> phi"
"##;

/// Loader holding the first-order calculus; further rule files may be added.
pub fn first_order_loader() -> RuleLoader {
    let mut loader = RuleLoader::new(Services::default());
    loader
        .load_str("first_order.toml", FIRST_ORDER_RULES)
        .expect("the first-order fixture loads");
    loader
}

pub fn first_order_env() -> (Services, Arc<RuleBase>) {
    let loaded = first_order_loader().finish();
    (loaded.services, loaded.rules)
}

/// Proof of `problem` with its own copy of `services`.
pub fn proof_for(services: &Services, rules: &Arc<RuleBase>, problem: &str) -> Proof {
    let services = services.for_proof();
    let sequent = parse_sequent(&services, problem).expect("the problem parses");
    Proof::new(problem, services, rules.clone(), sequent)
}
