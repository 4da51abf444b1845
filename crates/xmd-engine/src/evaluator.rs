//! Tree-walking interpreter (§4.3).

use std::collections::HashSet;
use std::time::{Duration, Instant};

use xmd_core::{Store, Value};

use crate::ast::{AssignOp, BinaryOp, Literal, LoopKind, Node, Program, UnaryOp};
use crate::error::EvalError;
use crate::host::Host;

/// Integer ranges and legacy-style comma lists in a for-in position are
/// capped at this many items (§4.3's "reject ranges of size > 1000").
/// Unlike the while-loop cap, this one is not configurable — it is a
/// hard grammar-level limit on the size of a single literal range.
const MAX_RANGE_ITEMS: usize = 1000;

const DEFAULT_WHILE_CAP: usize = 1000;

#[derive(Debug, Clone)]
enum Signal {
    None,
    Break,
    Continue,
    Return(Value),
}

/// Evaluation context: the store, the growing output buffer, control-flow
/// state, and the host capability boundary (§4.3).
pub struct Evaluator<'h> {
    pub store: Store,
    pub output: String,
    signal: Signal,
    host: &'h dyn Host,
    while_cap: usize,
    deadline: Option<Instant>,
}

impl<'h> Evaluator<'h> {
    pub fn new(store: Store, host: &'h dyn Host) -> Self {
        Evaluator {
            store,
            output: String::new(),
            signal: Signal::None,
            host,
            while_cap: DEFAULT_WHILE_CAP,
            deadline: None,
        }
    }

    pub fn with_while_cap(mut self, cap: usize) -> Self {
        self.while_cap = cap;
        self
    }

    /// Bound this evaluation to `budget` from now (§5's "each document
    /// evaluation carries an optional deadline; expiry raises a fatal
    /// error that unwinds the evaluator"), independent of the while-loop
    /// iteration cap and the command runner's own timeout.
    pub fn with_deadline(mut self, budget: Duration) -> Self {
        self.deadline = Some(Instant::now() + budget);
        self
    }

    pub fn run(&mut self, program: &Program) -> Result<(), EvalError> {
        self.eval_block(&program.statements)
    }

    fn check_deadline(&self) -> Result<(), EvalError> {
        match self.deadline {
            Some(d) if Instant::now() >= d => Err(EvalError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    fn eval_block(&mut self, stmts: &[Node]) -> Result<(), EvalError> {
        for stmt in stmts {
            self.check_deadline()?;
            self.eval_node(stmt)?;
            if !matches!(self.signal, Signal::None) {
                break;
            }
        }
        Ok(())
    }

    /// Every node, statement or expression, evaluates to a `Value` —
    /// statement-only nodes (assignment, loops, conditionals, control
    /// flow) return `Null` and act through `self.store`/`self.output`/
    /// `self.signal` instead.
    fn eval_node(&mut self, node: &Node) -> Result<Value, EvalError> {
        match node {
            Node::Literal(lit, _) => Ok(literal_value(lit)),

            Node::ArrayLiteral(elements, _) => {
                let mut items = Vec::with_capacity(elements.len());
                for el in elements {
                    items.push(self.eval_node(el)?);
                }
                Ok(Value::array(items))
            }

            Node::ObjectLiteral(pairs, _) => {
                let mut entries = Vec::with_capacity(pairs.len());
                for (key, expr) in pairs {
                    entries.push((key.clone(), self.eval_node(expr)?));
                }
                Ok(Value::object(entries))
            }

            Node::VariableRef(name, _) => Ok(self.store.get(name).unwrap_or(Value::Null)),

            Node::ArrayAccess(container, index, _) => {
                let container = self.eval_node(container)?;
                let index = self.eval_node(index)?;
                let index = index.to_number().floor() as i64;
                Ok(container.array_get(index))
            }

            Node::ObjectAccess(container, key, _) => {
                let container = self.eval_node(container)?;
                Ok(container.object_get(key))
            }

            Node::Range(start, end, location) => {
                let start = self.eval_node(start)?.to_number() as i64;
                let end = self.eval_node(end)?.to_number() as i64;
                Ok(Value::array(
                    self.expand_range(start, end, location)?
                        .into_iter()
                        .map(Value::Number)
                        .collect(),
                ))
            }

            Node::UnaryOp(op, operand, _) => {
                let value = self.eval_node(operand)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.to_bool()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                })
            }

            Node::BinaryOp(op, left, right, location) => self.eval_binary(*op, left, right, location),

            Node::Assignment(name, op, value_expr, _) => {
                let rhs = self.eval_node(value_expr)?;
                let result = match op {
                    AssignOp::Set => rhs,
                    AssignOp::AddAssign => {
                        let current = self.store.get(name).unwrap_or(Value::Null);
                        add_values(&current, &rhs)
                    }
                };
                self.store.set(name.clone(), result);
                Ok(Value::Null)
            }

            Node::Conditional {
                cond,
                then_block,
                elifs,
                else_block,
                ..
            } => {
                if self.eval_node(cond)?.to_bool() {
                    self.eval_block(then_block)?;
                    return Ok(Value::Null);
                }
                for (elif_cond, elif_block) in elifs {
                    if self.eval_node(elif_cond)?.to_bool() {
                        self.eval_block(elif_block)?;
                        return Ok(Value::Null);
                    }
                }
                if let Some(else_block) = else_block {
                    self.eval_block(else_block)?;
                }
                Ok(Value::Null)
            }

            Node::Loop {
                kind: LoopKind::ForIn,
                var_name,
                iterable_or_cond,
                body,
                location,
            } => {
                let var_name = var_name.as_deref().unwrap_or("_");
                let items = self.eval_for_items(iterable_or_cond, location)?;
                for item in items {
                    let keep: HashSet<String> = self.store.keys().into_iter().collect();
                    self.store.set(var_name, item);
                    self.eval_block(body)?;
                    let signal = std::mem::replace(&mut self.signal, Signal::None);
                    self.store.prune_except(&keep);
                    match signal {
                        Signal::None | Signal::Continue => continue,
                        Signal::Break => break,
                        Signal::Return(v) => {
                            self.signal = Signal::Return(v);
                            break;
                        }
                    }
                }
                Ok(Value::Null)
            }

            Node::Loop {
                kind: LoopKind::While,
                iterable_or_cond: cond,
                body,
                location,
                ..
            } => {
                let mut iterations = 0usize;
                loop {
                    if !self.eval_node(cond)?.to_bool() {
                        break;
                    }
                    iterations += 1;
                    if iterations > self.while_cap {
                        return Err(EvalError::WhileCapExceeded {
                            limit: self.while_cap,
                            location: location.clone(),
                        });
                    }
                    self.eval_block(body)?;
                    let signal = std::mem::replace(&mut self.signal, Signal::None);
                    match signal {
                        Signal::None | Signal::Continue => continue,
                        Signal::Break => break,
                        Signal::Return(v) => {
                            self.signal = Signal::Return(v);
                            break;
                        }
                    }
                }
                Ok(Value::Null)
            }

            Node::Block(stmts, _) => {
                self.eval_block(stmts)?;
                Ok(Value::Null)
            }

            Node::FunctionCall(name, args, location) => self.eval_call(name, args, location),

            Node::Break(_) => {
                self.signal = Signal::Break;
                Ok(Value::Null)
            }
            Node::Continue(_) => {
                self.signal = Signal::Continue;
                Ok(Value::Null)
            }
            Node::Return(expr, _) => {
                let value = match expr {
                    Some(e) => self.eval_node(e)?,
                    None => Value::Null,
                };
                self.signal = Signal::Return(value);
                Ok(Value::Null)
            }

            Node::Text(text, _) => {
                let rendered = crate::template::substitute_native(text, &self.store);
                self.output.push_str(&rendered);
                Ok(Value::Null)
            }
        }
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        left: &Node,
        right: &Node,
        location: &crate::ast::SourceLocation,
    ) -> Result<Value, EvalError> {
        match op {
            BinaryOp::And => {
                let l = self.eval_node(left)?;
                if !l.to_bool() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.eval_node(right)?.to_bool()))
            }
            BinaryOp::Or => {
                let l = self.eval_node(left)?;
                if l.to_bool() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.eval_node(right)?.to_bool()))
            }
            _ => {
                let l = self.eval_node(left)?;
                let r = self.eval_node(right)?;
                let _ = location;
                Ok(match op {
                    BinaryOp::Add | BinaryOp::AddAssign => add_values(&l, &r),
                    BinaryOp::Sub => Value::Number(l.to_number() - r.to_number()),
                    BinaryOp::Mul => Value::Number(l.to_number() * r.to_number()),
                    BinaryOp::Div => Value::Number(l.to_number() / r.to_number()),
                    BinaryOp::Eq => Value::Bool(l.value_eq(&r)),
                    BinaryOp::Ne => Value::Bool(!l.value_eq(&r)),
                    BinaryOp::Lt => Value::Bool(l.to_number() < r.to_number()),
                    BinaryOp::Le => Value::Bool(l.to_number() <= r.to_number()),
                    BinaryOp::Gt => Value::Bool(l.to_number() > r.to_number()),
                    BinaryOp::Ge => Value::Bool(l.to_number() >= r.to_number()),
                    BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
                })
            }
        }
    }

    fn eval_for_items(
        &mut self,
        node: &Node,
        location: &crate::ast::SourceLocation,
    ) -> Result<Vec<Value>, EvalError> {
        if let Node::Range(start, end, _) = node {
            let start = self.eval_node(start)?.to_number() as i64;
            let end = self.eval_node(end)?.to_number() as i64;
            return Ok(self
                .expand_range(start, end, location)?
                .into_iter()
                .map(Value::Number)
                .collect());
        }
        let value = self.eval_node(node)?;
        Ok(match &value {
            Value::Array(items) => items.borrow().clone(),
            // §9: for-over-object iterates values in insertion order.
            Value::Object(pairs) => pairs.borrow().iter().map(|(_, v)| v.clone()).collect(),
            Value::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
            _ => Vec::new(),
        })
    }

    fn expand_range(
        &self,
        start: i64,
        end: i64,
        location: &crate::ast::SourceLocation,
    ) -> Result<Vec<f64>, EvalError> {
        let count = (start - end).unsigned_abs() as usize + 1;
        if count > MAX_RANGE_ITEMS {
            return Err(EvalError::RangeTooLarge {
                start,
                end,
                limit: MAX_RANGE_ITEMS,
                location: location.clone(),
            });
        }
        let mut out = Vec::with_capacity(count);
        if start <= end {
            let mut i = start;
            while i <= end {
                out.push(i as f64);
                i += 1;
            }
        } else {
            let mut i = start;
            while i >= end {
                out.push(i as f64);
                i -= 1;
            }
        }
        Ok(out)
    }

    fn eval_call(
        &mut self,
        name: &str,
        args: &[Node],
        location: &crate::ast::SourceLocation,
    ) -> Result<Value, EvalError> {
        match name {
            "print" => {
                let value = match args.first() {
                    Some(expr) => self.eval_node(expr)?,
                    None => Value::Null,
                };
                self.output.push_str(&value.to_display_string());
                Ok(Value::Null)
            }
            "cmd" => {
                let cmd = self.arg_string(args, 0, location)?;
                let output = self.host.run_command(&cmd)?;
                Ok(Value::String(output))
            }
            "import" => {
                let path = self.arg_string(args, 0, location)?;
                let rendered = self.host.import(&path, &mut self.store)?;
                self.output.push_str(&rendered);
                Ok(Value::Null)
            }
            "json.stringify" => {
                let value = self.eval_node(args.first().ok_or_else(|| missing_arg(name, location))?)?;
                Ok(Value::String(self.host.json_stringify(&value)))
            }
            "json.parse" => {
                let text = self.arg_string(args, 0, location)?;
                self.host.json_parse(&text)
            }
            "yaml.stringify" => {
                let value = self.eval_node(args.first().ok_or_else(|| missing_arg(name, location))?)?;
                Ok(Value::String(self.host.yaml_stringify(&value)))
            }
            "yaml.parse" => {
                let text = self.arg_string(args, 0, location)?;
                self.host.yaml_parse(&text)
            }
            other => Err(EvalError::UnknownFunction {
                name: other.to_string(),
                location: location.clone(),
            }),
        }
    }

    fn arg_string(
        &mut self,
        args: &[Node],
        index: usize,
        location: &crate::ast::SourceLocation,
    ) -> Result<String, EvalError> {
        let expr = args.get(index).ok_or_else(|| EvalError::TypeError {
            message: format!("expected argument {}", index),
            location: location.clone(),
        })?;
        Ok(self.eval_node(expr)?.to_display_string())
    }
}

fn missing_arg(name: &str, location: &crate::ast::SourceLocation) -> EvalError {
    EvalError::TypeError {
        message: format!("'{}' requires an argument", name),
        location: location.clone(),
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::String(s) => Value::String(s.clone()),
        Literal::Number(n) => Value::Number(*n),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}

/// `+` per §4.3: string concatenation if either side is a String,
/// otherwise numeric addition. Shared by `BinaryOp::Add` and `+=`.
fn add_values(left: &Value, right: &Value) -> Value {
    if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
        Value::String(format!("{}{}", left.to_display_string(), right.to_display_string()))
    } else {
        Value::Number(left.to_number() + right.to_number())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullHost;
    use crate::parser::parse;

    fn run(src: &str) -> Evaluator<'static> {
        let program = parse(src).unwrap();
        let mut eval = Evaluator::new(Store::new(), &NullHost);
        eval.run(&program).unwrap();
        eval
    }

    #[test]
    fn range_loop_prints_concatenated_digits() {
        // S3: for x in 1..3 / print(x) -> "123"
        let eval = run("for x in 1..3\n  print(x)");
        assert_eq!(eval.output, "123");
    }

    #[test]
    fn accumulator_survives_across_iterations() {
        // S6: loop-local isolation must not revert pre-existing bindings.
        let eval = run("set a = [1,2,3]\nset s = \"\"\nfor n in a\n  s += n");
        assert_eq!(eval.store.get("s"), Some(Value::String("123".to_string())));
        assert_eq!(eval.store.get("n"), None);
    }

    #[test]
    fn short_circuit_and_or() {
        let eval = run("set hit = false\nset x = false && (hit = true)\nset y = true || (hit = true)");
        assert_eq!(eval.store.get("hit"), Some(Value::Bool(false)));
    }

    #[test]
    fn while_cap_is_enforced() {
        let program = parse("while true\n  print(1)").unwrap();
        let mut eval = Evaluator::new(Store::new(), &NullHost).with_while_cap(5);
        let err = eval.run(&program).unwrap_err();
        assert!(matches!(err, EvalError::WhileCapExceeded { limit: 5, .. }));
    }

    #[test]
    fn deadline_unwinds_evaluation() {
        // §5: an expired deadline is a fatal error independent of the
        // while-cap (set generously high here so it can't fire first).
        let program = parse("while true\n  print(1)").unwrap();
        let mut eval = Evaluator::new(Store::new(), &NullHost)
            .with_while_cap(1_000_000)
            .with_deadline(std::time::Duration::from_millis(0));
        std::thread::sleep(std::time::Duration::from_millis(5));
        let err = eval.run(&program).unwrap_err();
        assert!(matches!(err, EvalError::DeadlineExceeded));
    }

    #[test]
    fn range_over_1000_items_is_rejected() {
        let program = parse("for x in 1..2000\n  print(x)").unwrap();
        let mut eval = Evaluator::new(Store::new(), &NullHost);
        assert!(eval.run(&program).is_err());
    }

    #[test]
    fn break_stops_loop_and_still_prunes_loop_variable() {
        let eval = run("for n in [1,2,3]\n  if n == 2 then break\n  print(n)");
        assert_eq!(eval.output, "1");
        assert_eq!(eval.store.get("n"), None);
    }

    #[test]
    fn s6_accumulator_renders_through_a_trailing_template_reference() {
        // S6 in full: the accumulator built across loop iterations is
        // rendered by a `${s}` reference in host text below the loop,
        // not just left sitting in the store.
        let program = crate::parser::parse_mixed("set a = [1,2,3]\nset s = \"\"\nfor n in a\n  s += n\n${s}\n").unwrap();
        let mut eval = Evaluator::new(Store::new(), &NullHost);
        eval.run(&program).unwrap();
        assert!(eval.output.contains("123"));
    }

    #[test]
    fn elif_else_chain_picks_matching_branch() {
        // S2
        let eval = run(
            "set role = \"user\"\nif role == \"admin\"\n  print(\"a\")\nelif role == \"user\"\n  print(\"u\")\nelse\n  print(\"x\")",
        );
        assert_eq!(eval.output, "u");
    }
}
