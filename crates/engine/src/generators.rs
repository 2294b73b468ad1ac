//! Event generators and their compilation into event trees.
//!
//! A [`Generator`] is a pure declaration: `sequence`, `alternatives` or a
//! single `event`. The [`Compiler`] binds generators to a time point, resolves
//! operation tags, parameters and conditions against the catalog and the
//! simulation configuration, and grows an [`EventTree`] from them.
//!
//! Compilation first decomposes a generator block into [`NestableGenerator`]s:
//! consecutive events of one block are grouped and expanded together, nested
//! blocks are expanded recursively. Composition then walks the result
//! depth-first:
//!
//! - in a sequence, each part extends the current leaves and its output
//!   leaves feed the next part;
//! - in alternatives, every part starts from the same incoming leaves and the
//!   resulting leaves are collected, multiplying the branch count.

use serde::{Deserialize, Serialize};

use crate::catalog::OperationCatalog;
use crate::condition::Condition;
use crate::config::SimConfiguration;
use crate::error::{SimError, SimResult};
use crate::event_tree::{EventTree, NodeId};
use crate::payload::{Params, TimePoint};
use crate::processor::ProcessedOperation;

/// Declarative building block of a control declaration.
///
/// ```yaml
/// sequence:
///   - event: { operation: grow }
///   - alternatives:
///       - event: { operation: do_nothing }
///       - event: { operation: thinning, conditions: [is_dense] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Generator {
    Sequence(Vec<Generator>),
    Alternatives(Vec<Generator>),
    Event(EventSpec),
}

impl Generator {
    pub fn kind(&self) -> Option<GeneratorKind> {
        match self {
            Generator::Sequence(_) => Some(GeneratorKind::Sequence),
            Generator::Alternatives(_) => Some(GeneratorKind::Alternatives),
            Generator::Event(_) => None,
        }
    }

    /// Parse a standalone generator block from YAML.
    pub fn from_yaml_str(content: &str) -> SimResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(content);
        Ok(serde_yaml::with::singleton_map_recursive::deserialize(deserializer)?)
    }

    /// Shorthand for an event without parameters or conditions.
    pub fn event(operation: impl Into<String>) -> Self {
        Generator::Event(EventSpec::new(operation))
    }
}

/// A single operation inside a generator block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSpec {
    /// Operation tag, resolved in the catalog.
    pub operation: String,

    /// Inline parameter sets. Take precedence over `operation_params`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<Params>>,

    /// Names of catalog conditions that must all hold for the event to run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<String>,

    /// Names of catalog conditions the event's result must satisfy.
    /// A failing one prunes the branch.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub postconditions: Vec<String>,
}

impl EventSpec {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            parameters: None,
            conditions: Vec::new(),
            postconditions: Vec::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<Params>) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn with_conditions(mut self, conditions: Vec<String>) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn with_postconditions(mut self, postconditions: Vec<String>) -> Self {
        self.postconditions = postconditions;
        self
    }
}

/// How the members of a generator block combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    Sequence,
    Alternatives,
}

/// A generator block bound to a time point, with its events resolved.
#[derive(Debug)]
pub enum NestableGenerator<T> {
    /// Consecutive events of the enclosing block.
    Operations(Vec<ProcessedOperation<T>>),

    /// A nested block.
    Nested(GeneratorKind, Vec<NestableGenerator<T>>),
}

/// Turns generator declarations into event trees.
pub struct Compiler<'a, T> {
    config: &'a SimConfiguration,
    catalog: &'a OperationCatalog<T>,
}

impl<'a, T: 'static> Compiler<'a, T> {
    pub fn new(config: &'a SimConfiguration, catalog: &'a OperationCatalog<T>) -> Self {
        Self { config, catalog }
    }

    /// Extend `leaves` of `tree` with `generator` bound to `time_point`.
    ///
    /// Returns the new leaves.
    pub fn compile(
        &self,
        tree: &mut EventTree<T>,
        generator: &Generator,
        time_point: TimePoint,
        leaves: Vec<NodeId>,
    ) -> SimResult<Vec<NodeId>> {
        let nestable = self.expand_generator(generator, time_point, GeneratorKind::Sequence)?;
        Ok(compose(tree, GeneratorKind::Sequence, std::slice::from_ref(&nestable), leaves))
    }

    /// One tree spanning every declared time point.
    pub fn full_tree(&self) -> SimResult<EventTree<T>> {
        let mut tree = EventTree::new();
        let mut leaves = vec![tree.root()];
        for &time_point in self.config.time_points() {
            leaves = self.extend_time_point(&mut tree, time_point, leaves)?;
        }
        Ok(tree)
    }

    /// The tree of a single time point.
    pub fn partial_tree(&self, time_point: TimePoint) -> SimResult<EventTree<T>> {
        let mut tree = EventTree::new();
        let root = tree.root();
        self.extend_time_point(&mut tree, time_point, vec![root])?;
        Ok(tree)
    }

    /// All generators declared for `time_point`, in declaration order, as one sequence.
    fn extend_time_point(
        &self,
        tree: &mut EventTree<T>,
        time_point: TimePoint,
        leaves: Vec<NodeId>,
    ) -> SimResult<Vec<NodeId>> {
        let generators = self.config.generators_for(time_point);
        let nestable = self.expand(GeneratorKind::Sequence, generators, time_point)?;
        Ok(compose(tree, GeneratorKind::Sequence, &nestable, leaves))
    }

    /// Decompose the members of a block of `kind` into nestable parts.
    pub fn expand<'g>(
        &self,
        kind: GeneratorKind,
        members: impl IntoIterator<Item = &'g Generator>,
        time_point: TimePoint,
    ) -> SimResult<Vec<NestableGenerator<T>>> {
        let mut parts: Vec<NestableGenerator<T>> = Vec::new();
        for member in members {
            match member {
                Generator::Event(spec) => {
                    let operations = self.prepare_event(spec, time_point, kind)?;
                    match parts.last_mut() {
                        Some(NestableGenerator::Operations(group)) => group.extend(operations),
                        _ => parts.push(NestableGenerator::Operations(operations)),
                    }
                }
                nested => parts.push(self.expand_generator(nested, time_point, kind)?),
            }
        }
        Ok(parts)
    }

    fn expand_generator(
        &self,
        generator: &Generator,
        time_point: TimePoint,
        context: GeneratorKind,
    ) -> SimResult<NestableGenerator<T>> {
        match generator {
            Generator::Sequence(members) => Ok(NestableGenerator::Nested(
                GeneratorKind::Sequence,
                self.expand(GeneratorKind::Sequence, members, time_point)?,
            )),
            Generator::Alternatives(members) => {
                if members.is_empty() {
                    return Err(SimError::configuration(format!(
                        "Empty alternatives block at time point {}",
                        time_point
                    )));
                }
                Ok(NestableGenerator::Nested(
                    GeneratorKind::Alternatives,
                    self.expand(GeneratorKind::Alternatives, members, time_point)?,
                ))
            }
            Generator::Event(spec) => Ok(NestableGenerator::Operations(
                self.prepare_event(spec, time_point, context)?,
            )),
        }
    }

    /// Bind an event to one processed operation per parameter set.
    fn prepare_event(
        &self,
        spec: &EventSpec,
        time_point: TimePoint,
        context: GeneratorKind,
    ) -> SimResult<Vec<ProcessedOperation<T>>> {
        let operation = self.catalog.resolve(&spec.operation)?;
        let conditions = self.resolve_conditions(&spec.conditions)?;
        let postconditions = self.resolve_conditions(&spec.postconditions)?;
        let finalizer = self.catalog.finalizer();

        let mut parameter_sets = spec
            .parameters
            .clone()
            .or_else(|| self.config.operation_params(&spec.operation).map(|sets| sets.to_vec()))
            .unwrap_or_default();
        if parameter_sets.is_empty() {
            parameter_sets.push(Params::new());
        }

        if parameter_sets.len() > 1 && context == GeneratorKind::Sequence {
            return Err(SimError::configuration(format!(
                "Operation '{}' declares {} parameter sets inside a sequence. \
                 Multiple parameter sets are only supported for alternatives.",
                spec.operation,
                parameter_sets.len()
            )));
        }

        let run_constraint = self.config.run_constraint(&spec.operation).copied();
        parameter_sets
            .into_iter()
            .map(|params| {
                let params = self.config.merge_file_params(&spec.operation, params)?;
                Ok(
                    ProcessedOperation::new(spec.operation.clone(), time_point, params, operation.clone())
                        .with_run_constraint(run_constraint)
                        .with_conditions(conditions.clone())
                        .with_postconditions(postconditions.clone())
                        .with_finalizer(finalizer.clone()),
                )
            })
            .collect()
    }

    fn resolve_conditions(&self, names: &[String]) -> SimResult<Vec<Condition<T>>> {
        names
            .iter()
            .map(|name| self.catalog.resolve_condition(name))
            .collect()
    }
}

/// Attach `parts` of a block of `kind` to `leaves`, returning the new leaves.
pub fn compose<T>(
    tree: &mut EventTree<T>,
    kind: GeneratorKind,
    parts: &[NestableGenerator<T>],
    leaves: Vec<NodeId>,
) -> Vec<NodeId> {
    match kind {
        GeneratorKind::Sequence => parts
            .iter()
            .fold(leaves, |current, part| compose_part(tree, kind, part, current)),
        GeneratorKind::Alternatives => parts
            .iter()
            .flat_map(|part| compose_part(tree, kind, part, leaves.clone()))
            .collect(),
    }
}

fn compose_part<T>(
    tree: &mut EventTree<T>,
    kind: GeneratorKind,
    part: &NestableGenerator<T>,
    leaves: Vec<NodeId>,
) -> Vec<NodeId> {
    let operations = match part {
        NestableGenerator::Nested(nested_kind, parts) => {
            return compose(tree, *nested_kind, parts, leaves)
        }
        NestableGenerator::Operations(operations) => operations,
    };

    let mut result = Vec::new();
    match kind {
        GeneratorKind::Sequence => {
            for leaf in leaves {
                let mut parent = leaf;
                for operation in operations {
                    parent = tree.add_branch(parent, operation.clone());
                }
                result.push(parent);
            }
        }
        GeneratorKind::Alternatives => {
            for operation in operations {
                for &leaf in &leaves {
                    result.push(tree.add_branch(leaf, operation.clone()));
                }
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ControlDeclaration, EventDeclaration};
    use crate::operation::Outcome;
    use serde_json::json;

    fn catalog() -> OperationCatalog<i64> {
        let mut catalog = OperationCatalog::<i64>::with_builtins();
        for tag in ["a", "b", "c", "d"] {
            catalog.register_fn(tag, |state, _, _| Ok(Outcome::state(state + 1)));
        }
        catalog.register_condition("positive", |_, payload| payload.state > 0);
        catalog
    }

    fn config(events: Vec<(Vec<TimePoint>, Generator)>) -> SimConfiguration {
        let declaration = ControlDeclaration {
            events: events
                .into_iter()
                .map(|(time_points, generator)| EventDeclaration { time_points, generator })
                .collect(),
            ..Default::default()
        };
        SimConfiguration::from_declaration(declaration).unwrap()
    }

    fn chain_tags(tree: &EventTree<i64>) -> Vec<Vec<String>> {
        tree.operation_chains()
            .iter()
            .map(|chain| chain.iter().map(|op| op.tag().to_string()).collect())
            .collect()
    }

    fn params(value: i64) -> Params {
        let mut params = Params::new();
        params.insert("value".to_string(), json!(value));
        params
    }

    #[test]
    fn test_generator_deserialize() {
        let yaml = r#"
sequence:
  - event: { operation: a }
  - alternatives:
      - event: { operation: b, conditions: [positive], postconditions: [positive] }
      - event:
          operation: c
          parameters: [{ value: 1 }, { value: 2 }]
"#;
        let generator = Generator::from_yaml_str(yaml).unwrap();
        assert_eq!(generator.kind(), Some(GeneratorKind::Sequence));
        let Generator::Sequence(members) = generator else {
            panic!("expected a sequence");
        };
        assert_eq!(members[0], Generator::event("a"));
        assert_eq!(
            members[1],
            Generator::Alternatives(vec![
                Generator::Event(
                    EventSpec::new("b")
                        .with_conditions(vec!["positive".to_string()])
                        .with_postconditions(vec!["positive".to_string()])
                ),
                Generator::Event(EventSpec::new("c").with_parameters(vec![params(1), params(2)])),
            ])
        );
    }

    #[test]
    fn test_sequence_of_alternatives() {
        let generator = Generator::Sequence(vec![
            Generator::Alternatives(vec![Generator::event("a"), Generator::event("b")]),
            Generator::event("c"),
        ]);
        let config = config(vec![(vec![0], generator)]);
        let catalog = catalog();
        let tree = Compiler::new(&config, &catalog).full_tree().unwrap();

        assert_eq!(
            chain_tags(&tree),
            vec![vec!["a".to_string(), "c".to_string()], vec!["b".to_string(), "c".to_string()]]
        );
    }

    #[test]
    fn test_alternatives_multiply_leaves() {
        let generator = Generator::Sequence(vec![
            Generator::Alternatives(vec![Generator::event("a"), Generator::event("b")]),
            Generator::Alternatives(vec![
                Generator::event("c"),
                Generator::Sequence(vec![Generator::event("c"), Generator::event("d")]),
            ]),
        ]);
        let config = config(vec![(vec![0], generator)]);
        let catalog = catalog();
        let tree = Compiler::new(&config, &catalog).partial_tree(0).unwrap();

        assert_eq!(tree.leaves().len(), 4);
        let chains = chain_tags(&tree);
        assert!(chains.contains(&vec!["a".to_string(), "c".to_string()]));
        assert!(chains.contains(&vec!["b".to_string(), "c".to_string(), "d".to_string()]));
    }

    #[test]
    fn test_full_tree_spans_time_points() {
        let config = config(vec![
            (vec![1, 3], Generator::event("a")),
            (vec![2], Generator::Alternatives(vec![Generator::event("b"), Generator::event("c")])),
            (vec![3], Generator::event("d")),
        ]);
        let catalog = catalog();
        let compiler = Compiler::new(&config, &catalog);
        let tree = compiler.full_tree().unwrap();

        let chains = tree.operation_chains();
        assert_eq!(chains.len(), 2);
        for chain in &chains {
            let points: Vec<TimePoint> = chain.iter().map(|op| op.time_point()).collect();
            assert_eq!(points, vec![1, 2, 3, 3]);
            assert_eq!(chain[2].tag(), "a");
            assert_eq!(chain[3].tag(), "d");
        }

        let partial = compiler.partial_tree(3).unwrap();
        assert_eq!(chain_tags(&partial), vec![vec!["a".to_string(), "d".to_string()]]);
    }

    #[test]
    fn test_parameter_sets_fan_out_in_alternatives() {
        let generator = Generator::Alternatives(vec![
            Generator::Event(EventSpec::new("a").with_parameters(vec![params(1), params(2)])),
            Generator::event("b"),
        ]);
        let config = config(vec![(vec![0], generator)]);
        let catalog = catalog();
        let tree = Compiler::new(&config, &catalog).full_tree().unwrap();

        let chains = tree.operation_chains();
        assert_eq!(chains.len(), 3);
        assert_eq!(chains[0][0].params(), &params(1));
        assert_eq!(chains[1][0].params(), &params(2));
        assert_eq!(chains[2][0].tag(), "b");
    }

    #[test]
    fn test_parameter_sets_rejected_in_sequence() {
        let generator = Generator::Sequence(vec![Generator::Event(
            EventSpec::new("a").with_parameters(vec![params(1), params(2)]),
        )]);
        let config = config(vec![(vec![0], generator)]);
        let catalog = catalog();
        let err = Compiler::new(&config, &catalog).full_tree().unwrap_err();
        assert!(matches!(err, SimError::Configuration(_)));
    }

    #[test]
    fn test_unknown_operation_and_condition() {
        let catalog = catalog();

        let unknown_operation = config(vec![(vec![0], Generator::event("grow"))]);
        let err = Compiler::new(&unknown_operation, &catalog).full_tree().unwrap_err();
        assert_eq!(err, SimError::configuration("Unknown operation 'grow'"));

        let generator =
            Generator::Event(EventSpec::new("a").with_conditions(vec!["is_dense".to_string()]));
        let unknown_condition = config(vec![(vec![0], generator)]);
        let err = Compiler::new(&unknown_condition, &catalog).full_tree().unwrap_err();
        assert_eq!(err, SimError::configuration("Unknown condition 'is_dense'"));

        let generator =
            Generator::Event(EventSpec::new("a").with_postconditions(vec!["is_sparse".to_string()]));
        let unknown_postcondition = config(vec![(vec![0], generator)]);
        let err = Compiler::new(&unknown_postcondition, &catalog).full_tree().unwrap_err();
        assert_eq!(err, SimError::configuration("Unknown condition 'is_sparse'"));
    }

    #[test]
    fn test_empty_alternatives_rejected() {
        let config = config(vec![(vec![0], Generator::Alternatives(vec![]))]);
        let catalog = catalog();
        assert!(Compiler::new(&config, &catalog).partial_tree(0).is_err());
    }

    #[test]
    fn test_compile_onto_existing_leaves() {
        let config = config(vec![]);
        let catalog = catalog();
        let compiler = Compiler::new(&config, &catalog);

        let mut tree = EventTree::new();
        let root = tree.root();
        let leaves = compiler
            .compile(
                &mut tree,
                &Generator::Alternatives(vec![Generator::event("a"), Generator::event("b")]),
                5,
                vec![root],
            )
            .unwrap();
        assert_eq!(leaves.len(), 2);

        let leaves = compiler
            .compile(&mut tree, &Generator::event("c"), 6, leaves)
            .unwrap();
        assert_eq!(leaves.len(), 2);
        assert_eq!(tree.len(), 5);
    }
}
