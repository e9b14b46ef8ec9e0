//! Sweep (c): graph materialisation. Emits one compact `GraphNode` per
//! declaration, aggregates its outbound `Dependencies`, then inverts
//! every edge into the target's `References`, synthesising `UNKNOWN`
//! placeholder nodes for targets not found in the repository.

use crate::identity::Identity;
use crate::model::{Edge, EdgeKind, GraphNode, NodeKind, Repository};

pub fn materialize_graph(repository: &mut Repository) {
    let mut graph = std::collections::BTreeMap::new();

    for module in repository.modules.values() {
        for package in module.packages.values() {
            for function in package.functions.values() {
                let mut dependencies = Vec::new();
                for dep in function
                    .function_calls
                    .iter()
                    .chain(function.method_calls.iter())
                    .chain(function.types.iter())
                    .chain(function.global_vars.iter())
                {
                    dependencies.push(Edge { identity: dep.identity.clone(), kind: EdgeKind::Dependency });
                }
                graph.insert(
                    function.identity.full(),
                    GraphNode {
                        identity: function.identity.clone(),
                        kind: NodeKind::FUNC,
                        dependencies,
                        references: Vec::new(),
                        implements: Vec::new(),
                        groups: Vec::new(),
                    },
                );
            }
            for type_decl in package.types.values() {
                let implements: Vec<Edge> = type_decl
                    .implements
                    .iter()
                    .map(|id| Edge { identity: id.clone(), kind: EdgeKind::Implement })
                    .collect();
                graph.insert(
                    type_decl.identity.full(),
                    GraphNode {
                        identity: type_decl.identity.clone(),
                        kind: NodeKind::TYPE,
                        dependencies: Vec::new(),
                        references: Vec::new(),
                        implements,
                        groups: Vec::new(),
                    },
                );
            }
            for var in package.vars.values() {
                let dependencies: Vec<Edge> = var
                    .dependencies
                    .iter()
                    .map(|dep| Edge { identity: dep.identity.clone(), kind: EdgeKind::Dependency })
                    .collect();
                let groups: Vec<Edge> = var
                    .groups
                    .iter()
                    .map(|id| Edge { identity: id.clone(), kind: EdgeKind::Group })
                    .collect();
                graph.insert(
                    var.identity.full(),
                    GraphNode {
                        identity: var.identity.clone(),
                        kind: NodeKind::VAR,
                        dependencies,
                        references: Vec::new(),
                        implements: Vec::new(),
                        groups,
                    },
                );
            }
        }
    }

    invert_dependencies_into_references(&mut graph);

    repository.graph = graph;
}

fn invert_dependencies_into_references(graph: &mut std::collections::BTreeMap<String, GraphNode>) {
    let mut reference_edges: Vec<(Identity, Edge)> = Vec::new();
    for node in graph.values() {
        for dep in &node.dependencies {
            if dep.kind == EdgeKind::Dependency {
                reference_edges.push((
                    dep.identity.clone(),
                    Edge { identity: node.identity.clone(), kind: EdgeKind::Dependency },
                ));
            }
        }
    }

    for (target, back_edge) in reference_edges {
        let key = target.full();
        let node = graph
            .entry(key)
            .or_insert_with(|| GraphNode::placeholder(target.clone()));
        if !node.references.iter().any(|e| e.identity == back_edge.identity) {
            node.references.push(back_edge);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::model::*;

    #[test]
    fn dependency_edge_gets_a_reciprocal_reference() {
        let mut repo = Repository::new("id", "/repo");
        let module = repo.module_mut("m");
        let mut package = Package { pkg_path: "p".to_string(), ..Default::default() };

        let mut function_calls = DependencySet::new();
        function_calls.insert_or_ignore(Identity::new("m", "p", "Callee"), FileLine::new("p/f.go", 1, 0, 1));

        package.functions.insert(
            "Caller".to_string(),
            Function {
                identity: Identity::new("m", "p", "Caller"),
                file_line: FileLine::new("p/f.go", 1, 0, 1),
                exported: true,
                is_method: false,
                is_interface_method: false,
                receiver: None,
                params: Vec::new(),
                results: Vec::new(),
                function_calls,
                method_calls: DependencySet::new(),
                types: DependencySet::new(),
                global_vars: DependencySet::new(),
                signature: String::new(),
                content: String::new(),
            },
        );
        module.packages.insert("p".to_string(), package);

        materialize_graph(&mut repo);

        let callee_key = Identity::new("m", "p", "Callee").full();
        let callee_node = &repo.graph[&callee_key];
        assert_eq!(callee_node.kind, NodeKind::UNKNOWN);
        assert_eq!(callee_node.references.len(), 1);
        assert_eq!(callee_node.references[0].identity.name, "Caller");
    }
}
