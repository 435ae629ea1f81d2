use k8s_openapi::api::core::v1::{
    Affinity, NodeAffinity, NodeSelector, NodeSelectorRequirement, NodeSelectorTerm, PodSpec,
};

const OS_LABEL: &str = "kubernetes.io/os";

/// Keeps a single required node selector term carrying the dataplane's node requirements
/// (linux plus any extra requirements).
///
/// An existing term is left alone as long as it carries every requirement with the same
/// operator and values; otherwise the terms are rebuilt.
pub struct NodeTermsBuilder {
    requirements: Vec<NodeSelectorRequirement>,
}

impl Default for NodeTermsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeTermsBuilder {
    pub fn new() -> Self {
        NodeTermsBuilder { requirements: vec![] }.with_requirement(OS_LABEL, &["linux"])
    }

    pub fn with_requirement(mut self, key: &str, values: &[&str]) -> Self {
        self.requirements.push(NodeSelectorRequirement {
            key: key.to_string(),
            operator: "In".to_string(),
            values: Some(values.iter().map(|v| v.to_string()).collect()),
        });
        self
    }

    pub fn build(self, pod_spec: &mut PodSpec) {
        let selector = pod_spec
            .affinity
            .get_or_insert_with(Affinity::default)
            .node_affinity
            .get_or_insert_with(NodeAffinity::default)
            .required_during_scheduling_ignored_during_execution
            .get_or_insert_with(NodeSelector::default);

        if !self.is_satisfied_by(selector) {
            selector.node_selector_terms = vec![NodeSelectorTerm {
                match_expressions: Some(self.requirements),
                match_fields: None,
            }];
        }
    }

    fn is_satisfied_by(&self, selector: &NodeSelector) -> bool {
        let [term] = selector.node_selector_terms.as_slice() else {
            return false;
        };
        let actual = term.match_expressions.as_deref().unwrap_or_default();

        self.requirements.iter().all(|desired| {
            actual.iter().any(|a| {
                let desired_values = desired.values.as_deref().unwrap_or_default();
                let actual_values = a.values.as_deref().unwrap_or_default();
                a.key == desired.key
                    && a.operator == desired.operator
                    && actual_values.len() == desired_values.len()
                    && desired_values.iter().all(|v| actual_values.contains(v))
            })
        })
    }
}
