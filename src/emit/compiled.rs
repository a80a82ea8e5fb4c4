//! Compiled emitter
//!
//! Lowers the resolved tree into builder routines: flat instruction lists
//! that can be rendered as source text or executed to materialize the same
//! instance graph the interpreted emitter produces. Each template body gets
//! its own routine so a host can instantiate templates independently of the
//! page they came from.

use std::fmt::Write as _;

use indexmap::IndexMap;
use tracing::debug;

use crate::resolver::tree::{ResolvedControlNode, ResolvedTree, ResolvedValue, TypedValue};

use super::interpreted::{ControlInstance, InstanceValue, TemplateInstance};
use super::{ensure_assignable, EmitError, ViewEmitter};

/// A scalar operand of an instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(TypedValue),
    Binding { kind: String, expression: String },
}

/// One builder instruction
///
/// Routines run against a control stack: `Create` pushes, the attachment
/// instructions pop the top control into the one beneath it, and `Return`
/// pops the top control into the routine's output.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Push a fresh control
    Create {
        type_name: String,
        id: String,
        data_context: Option<String>,
    },
    /// Set a literal property on the top control
    SetProperty { name: String, value: TypedValue },
    /// Set an unevaluated binding property on the top control
    SetBinding {
        name: String,
        kind: String,
        expression: String,
    },
    /// Set a property the control does not declare itself
    SetAttachedProperty { name: String, value: Operand },
    /// Set an HTML passthrough attribute on the top control
    SetHtmlAttribute { name: String, value: Operand },
    /// Pop the top control into a property of the control beneath
    SetControl { name: String },
    /// Install an empty collection property on the top control; items are
    /// appended by `AddCollectionItem`. Emitted even when no items follow,
    /// so an empty collection assignment survives into the instance.
    SetCollection { name: String },
    /// Pop the top control into a collection property of the control beneath
    AddCollectionItem { name: String },
    /// Instantiate a template routine into a property of the top control
    SetTemplate { name: String, routine: String },
    /// Pop the top control into the control beneath as a child
    AddChild,
    /// Pop the top control into the routine output
    Return,
}

/// One builder routine
#[derive(Debug, Clone, PartialEq)]
pub struct BuilderRoutine {
    pub name: String,
    pub instructions: Vec<Instruction>,
}

/// The compiled form of one markup file
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledArtifact {
    /// Routines by name, entry first
    pub routines: IndexMap<String, BuilderRoutine>,
    /// Name of the routine that builds the page root
    pub entry: String,
    /// Identity of the compiled file
    pub origin: String,
}

impl CompiledArtifact {
    /// Execute the entry routine and return the root instance
    pub fn instantiate(&self) -> Result<ControlInstance, EmitError> {
        let mut roots = self.run_routine(&self.entry)?;
        match (roots.pop(), roots.is_empty()) {
            (Some(root), true) => Ok(root),
            _ => Err(EmitError::MalformedRoutine {
                name: self.entry.clone(),
                detail: "entry routine must return exactly one control".into(),
            }),
        }
    }

    fn run_routine(&self, name: &str) -> Result<Vec<ControlInstance>, EmitError> {
        let routine = self
            .routines
            .get(name)
            .ok_or_else(|| EmitError::MissingRoutine {
                name: name.to_string(),
            })?;

        let malformed = |detail: &str| EmitError::MalformedRoutine {
            name: name.to_string(),
            detail: detail.to_string(),
        };

        let mut stack: Vec<ControlInstance> = Vec::new();
        let mut output = Vec::new();
        for instruction in &routine.instructions {
            match instruction {
                Instruction::Create {
                    type_name,
                    id,
                    data_context,
                } => {
                    let mut instance = ControlInstance::new(type_name, id);
                    instance.data_context = data_context.clone();
                    stack.push(instance);
                }
                Instruction::SetProperty { name, value } => {
                    let top = stack.last_mut().ok_or_else(|| malformed("empty stack"))?;
                    top.properties
                        .insert(name.clone(), InstanceValue::Value(value.clone()));
                }
                Instruction::SetBinding {
                    name,
                    kind,
                    expression,
                } => {
                    let top = stack.last_mut().ok_or_else(|| malformed("empty stack"))?;
                    top.properties.insert(
                        name.clone(),
                        InstanceValue::Binding {
                            kind: kind.clone(),
                            expression: expression.clone(),
                        },
                    );
                }
                Instruction::SetAttachedProperty { name, value } => {
                    let top = stack.last_mut().ok_or_else(|| malformed("empty stack"))?;
                    top.properties.insert(name.clone(), operand_value(value));
                }
                Instruction::SetHtmlAttribute { name, value } => {
                    let top = stack.last_mut().ok_or_else(|| malformed("empty stack"))?;
                    top.html_attributes
                        .insert(name.clone(), operand_value(value));
                }
                Instruction::SetControl { name } => {
                    let child = stack.pop().ok_or_else(|| malformed("empty stack"))?;
                    let top = stack.last_mut().ok_or_else(|| malformed("empty stack"))?;
                    top.properties
                        .insert(name.clone(), InstanceValue::Control(Box::new(child)));
                }
                Instruction::SetCollection { name } => {
                    let top = stack.last_mut().ok_or_else(|| malformed("empty stack"))?;
                    top.properties
                        .insert(name.clone(), InstanceValue::Collection(Vec::new()));
                }
                Instruction::AddCollectionItem { name } => {
                    let item = stack.pop().ok_or_else(|| malformed("empty stack"))?;
                    let top = stack.last_mut().ok_or_else(|| malformed("empty stack"))?;
                    match top
                        .properties
                        .entry(name.clone())
                        .or_insert_with(|| InstanceValue::Collection(Vec::new()))
                    {
                        InstanceValue::Collection(items) => items.push(item),
                        _ => return Err(malformed("property is not a collection")),
                    }
                }
                Instruction::SetTemplate { name, routine } => {
                    let controls = self.run_routine(routine)?;
                    let top = stack.last_mut().ok_or_else(|| malformed("empty stack"))?;
                    top.properties.insert(
                        name.clone(),
                        InstanceValue::Template(TemplateInstance { controls }),
                    );
                }
                Instruction::AddChild => {
                    let child = stack.pop().ok_or_else(|| malformed("empty stack"))?;
                    let top = stack.last_mut().ok_or_else(|| malformed("empty stack"))?;
                    top.children.push(child);
                }
                Instruction::Return => {
                    let top = stack.pop().ok_or_else(|| malformed("empty stack"))?;
                    output.push(top);
                }
            }
        }
        if !stack.is_empty() {
            return Err(malformed("routine left controls on the stack"));
        }
        Ok(output)
    }

    /// Render the artifact as builder source text
    pub fn generate_source(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "// generated from {}", self.origin);
        for routine in self.routines.values() {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "pub fn {}(f: &mut ControlFactory) -> Vec<ControlInstance> {{",
                routine.name
            );
            let _ = writeln!(out, "    let mut out = Vec::new();");
            let mut stack: Vec<String> = Vec::new();
            for instruction in &routine.instructions {
                render_instruction(&mut out, instruction, &mut stack);
            }
            let _ = writeln!(out, "    out");
            let _ = writeln!(out, "}}");
        }
        out
    }
}

fn operand_value(operand: &Operand) -> InstanceValue {
    match operand {
        Operand::Value(value) => InstanceValue::Value(value.clone()),
        Operand::Binding { kind, expression } => InstanceValue::Binding {
            kind: kind.clone(),
            expression: expression.clone(),
        },
    }
}

fn render_value(value: &TypedValue) -> String {
    match value {
        TypedValue::String(s) => format!("{:?}", s),
        other => other.to_string(),
    }
}

fn render_operand(operand: &Operand) -> String {
    match operand {
        Operand::Value(value) => render_value(value),
        Operand::Binding { kind, expression } => {
            format!("f.binding({:?}, {:?})", kind, expression)
        }
    }
}

fn render_instruction(out: &mut String, instruction: &Instruction, stack: &mut Vec<String>) {
    match instruction {
        Instruction::Create { type_name, id, .. } => {
            let var = id.clone();
            let _ = writeln!(out, "    let mut {} = f.create({:?});", var, type_name);
            stack.push(var);
        }
        Instruction::SetProperty { name, value } => {
            if let Some(var) = stack.last() {
                let _ = writeln!(out, "    {}.set({:?}, {});", var, name, render_value(value));
            }
        }
        Instruction::SetBinding {
            name,
            kind,
            expression,
        } => {
            if let Some(var) = stack.last() {
                let _ = writeln!(
                    out,
                    "    {}.set({:?}, f.binding({:?}, {:?}));",
                    var, name, kind, expression
                );
            }
        }
        Instruction::SetAttachedProperty { name, value } => {
            if let Some(var) = stack.last() {
                let _ = writeln!(
                    out,
                    "    {}.set_attached({:?}, {});",
                    var,
                    name,
                    render_operand(value)
                );
            }
        }
        Instruction::SetHtmlAttribute { name, value } => {
            if let Some(var) = stack.last() {
                let _ = writeln!(
                    out,
                    "    {}.set_attribute({:?}, {});",
                    var,
                    name,
                    render_operand(value)
                );
            }
        }
        Instruction::SetControl { name } => {
            if let Some(child) = stack.pop() {
                if let Some(var) = stack.last() {
                    let _ = writeln!(out, "    {}.set({:?}, {});", var, name, child);
                }
            }
        }
        Instruction::SetCollection { name } => {
            if let Some(var) = stack.last() {
                let _ = writeln!(out, "    {}.set_collection({:?});", var, name);
            }
        }
        Instruction::AddCollectionItem { name } => {
            if let Some(item) = stack.pop() {
                if let Some(var) = stack.last() {
                    let _ = writeln!(out, "    {}.add_item({:?}, {});", var, name, item);
                }
            }
        }
        Instruction::SetTemplate { name, routine } => {
            if let Some(var) = stack.last() {
                let _ = writeln!(out, "    {}.set_template({:?}, {});", var, name, routine);
            }
        }
        Instruction::AddChild => {
            if let Some(child) = stack.pop() {
                if let Some(var) = stack.last() {
                    let _ = writeln!(out, "    {}.add_child({});", var, child);
                }
            }
        }
        Instruction::Return => {
            if let Some(var) = stack.pop() {
                let _ = writeln!(out, "    out.push({});", var);
            }
        }
    }
}

/// Tree-to-routines emitter
#[derive(Debug, Default)]
pub struct CompiledEmitter {
    routines: IndexMap<String, BuilderRoutine>,
    next_template: usize,
}

impl CompiledEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lower_node(
        &mut self,
        node: &ResolvedControlNode,
        code: &mut Vec<Instruction>,
    ) -> Result<(), EmitError> {
        code.push(Instruction::Create {
            type_name: node.metadata.type_name.clone(),
            id: node.id.clone(),
            data_context: node.data_context.clone(),
        });

        for (name, value) in &node.assignments {
            ensure_assignable(node, name, value)?;
            // a name the control does not declare came through the
            // attached-property table
            let attached = !node.metadata.properties.contains_key(name);
            match value {
                ResolvedValue::Literal(literal) if attached => {
                    code.push(Instruction::SetAttachedProperty {
                        name: name.clone(),
                        value: Operand::Value(literal.clone()),
                    })
                }
                ResolvedValue::Binding { kind, expression } if attached => {
                    code.push(Instruction::SetAttachedProperty {
                        name: name.clone(),
                        value: Operand::Binding {
                            kind: kind.clone(),
                            expression: expression.clone(),
                        },
                    })
                }
                ResolvedValue::Literal(literal) => code.push(Instruction::SetProperty {
                    name: name.clone(),
                    value: literal.clone(),
                }),
                ResolvedValue::Binding { kind, expression } => {
                    code.push(Instruction::SetBinding {
                        name: name.clone(),
                        kind: kind.clone(),
                        expression: expression.clone(),
                    })
                }
                ResolvedValue::Control(child) => {
                    self.lower_node(child, code)?;
                    code.push(Instruction::SetControl { name: name.clone() });
                }
                ResolvedValue::Collection(items) => {
                    code.push(Instruction::SetCollection { name: name.clone() });
                    for item in items {
                        self.lower_node(item, code)?;
                        code.push(Instruction::AddCollectionItem { name: name.clone() });
                    }
                }
                ResolvedValue::Template(body) => {
                    let routine = self.lower_template(body)?;
                    code.push(Instruction::SetTemplate {
                        name: name.clone(),
                        routine,
                    });
                }
            }
        }

        for (name, value) in &node.html_attributes {
            let operand = match value {
                ResolvedValue::Literal(literal) => Operand::Value(literal.clone()),
                ResolvedValue::Binding { kind, expression } => Operand::Binding {
                    kind: kind.clone(),
                    expression: expression.clone(),
                },
                // the resolver only produces scalar attribute values
                _ => continue,
            };
            code.push(Instruction::SetHtmlAttribute {
                name: name.clone(),
                value: operand,
            });
        }

        for child in &node.children {
            self.lower_node(child, code)?;
            code.push(Instruction::AddChild);
        }
        Ok(())
    }

    fn lower_template(&mut self, body: &[ResolvedControlNode]) -> Result<String, EmitError> {
        let name = format!("build_template_{}", self.next_template);
        self.next_template += 1;
        let mut code = Vec::new();
        for node in body {
            self.lower_node(node, &mut code)?;
            code.push(Instruction::Return);
        }
        self.routines.insert(
            name.clone(),
            BuilderRoutine {
                name: name.clone(),
                instructions: code,
            },
        );
        Ok(name)
    }
}

impl ViewEmitter for CompiledEmitter {
    type Artifact = CompiledArtifact;

    fn emit(&mut self, tree: &ResolvedTree) -> Result<CompiledArtifact, EmitError> {
        self.routines.clear();
        self.next_template = 0;

        let entry = "build_view".to_string();
        let mut code = Vec::new();
        self.lower_node(&tree.root, &mut code)?;
        code.push(Instruction::Return);

        let mut routines = IndexMap::new();
        routines.insert(
            entry.clone(),
            BuilderRoutine {
                name: entry.clone(),
                instructions: code,
            },
        );
        // template routines follow the entry
        routines.extend(std::mem::take(&mut self.routines));

        debug!(origin = %tree.origin, routines = routines.len(), "lowered view to builder routines");
        Ok(CompiledArtifact {
            routines,
            entry,
            origin: tree.origin.clone(),
        })
    }
}
