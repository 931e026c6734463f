//! Native functions available to every program.
//!
//! Builtins are bound in the root environment like any other value. Their
//! names are reserved: the command table never treats them as shell
//! commands, so a `make` on `PATH` cannot shadow `make(chan int)`.

use std::sync::Arc;

use crate::ast::DataType;

use super::eval::{EvalError, EvalResult, Interpreter};
use super::scope::Environment;
use super::value::{Channel, Slice, Value};

/// Names of every builtin.
pub const BUILTIN_NAMES: &[&str] = &["print", "len", "append", "read", "make"];

/// A native function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Print,
    Len,
    Append,
    Read,
    Make,
}

impl Builtin {
    pub const ALL: [Builtin; 5] = [
        Builtin::Print,
        Builtin::Len,
        Builtin::Append,
        Builtin::Read,
        Builtin::Make,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Len => "len",
            Builtin::Append => "append",
            Builtin::Read => "read",
            Builtin::Make => "make",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    /// Invoke the builtin with evaluated arguments.
    pub fn call(self, interpreter: &Interpreter, args: Vec<Value>) -> EvalResult<Value> {
        match self {
            Builtin::Print => {
                let mut line = String::new();
                for arg in &args {
                    line.push_str(&arg.to_string());
                    line.push(' ');
                }
                line.push('\n');
                interpreter.console().write_out(&line);
                Ok(Value::Nil)
            }
            Builtin::Len => {
                let [arg] = exact::<1>(args)?;
                let len = match &arg {
                    Value::Slice(slice) => slice.len(),
                    Value::Str(s) => s.len(),
                    Value::Channel(ch) => ch.len(),
                    other => return Err(self.error(format!("unsupported argument type {}", other.data_type()))),
                };
                Ok(Value::Integer(i64::try_from(len).unwrap_or(i64::MAX)))
            }
            Builtin::Append => append(args),
            Builtin::Read => {
                let [arg] = exact::<1>(args)?;
                let Value::Reference(target) = arg else {
                    return Err(self.error(format!(
                        "expected a reference, got {}",
                        arg.data_type()
                    )));
                };
                let Some(word) = interpreter.console().read_word() else {
                    return Err(self.error("end of input".to_string()));
                };
                let value = match target.get() {
                    Value::Integer(_) => Value::Integer(parse_int(&word)?),
                    Value::Str(_) => Value::Str(word),
                    Value::Boolean(_) => match word.as_str() {
                        "true" => Value::Boolean(true),
                        "false" => Value::Boolean(false),
                        _ => return Err(self.error(format!("{word:?} is not a bool"))),
                    },
                    Value::Any(_) => Value::Any(word),
                    other => {
                        return Err(self.error(format!(
                            "cannot read into {}",
                            other.data_type()
                        )));
                    }
                };
                target.set(value);
                Ok(Value::Nil)
            }
            Builtin::Make => make(args),
        }
    }

    fn error(self, message: String) -> EvalError {
        EvalError::Builtin {
            builtin: self.name(),
            message,
        }
    }
}

/// Bind every builtin in `env`.
pub fn install(env: &Environment<Value>) {
    for builtin in Builtin::ALL {
        env.declare(builtin.name(), Value::Builtin(builtin));
    }
}

fn exact<const N: usize>(args: Vec<Value>) -> EvalResult<[Value; N]> {
    let got = args.len();
    args.try_into()
        .map_err(|_| EvalError::ArgumentCount { expected: N, got })
}

fn parse_int(word: &str) -> EvalResult<i64> {
    word.trim()
        .parse()
        .map_err(|_| EvalError::NotAnInteger(word.to_string()))
}

fn append(args: Vec<Value>) -> EvalResult<Value> {
    let mut args = args.into_iter();
    let Some(first) = args.next() else {
        return Err(EvalError::ArgumentCount {
            expected: 1,
            got: 0,
        });
    };
    let Value::Slice(slice) = first else {
        return Err(Builtin::Append.error(format!(
            "first argument must be a slice, got {}",
            first.data_type()
        )));
    };

    let mut items = slice.items.clone();
    for item in args {
        let got = item.data_type();
        if !slice.elem.accepts(&got) {
            return Err(EvalError::CannotAppend {
                item: got,
                slice: DataType::slice_of(slice.elem.clone()),
            });
        }
        items.push(if slice.elem == DataType::Any {
            item.boxed()
        } else {
            item
        });
    }
    Ok(Value::Slice(Arc::new(Slice::new(slice.elem.clone(), items))))
}

fn make(args: Vec<Value>) -> EvalResult<Value> {
    let got = args.len();
    let mut args = args.into_iter();
    let ty = match args.next() {
        Some(Value::DataType(ty)) => ty,
        Some(other) => return Err(EvalError::CannotMake(other.data_type())),
        None => return Err(EvalError::ArgumentCount { expected: 1, got }),
    };
    let arg = args.next();
    if args.next().is_some() {
        return Err(EvalError::ArgumentCount { expected: 2, got });
    }

    match (&ty, arg) {
        (DataType::Int, Some(Value::Integer(n))) => Ok(Value::Integer(n)),
        (DataType::Int, Some(Value::Str(s))) => Ok(Value::Integer(parse_int(&s)?)),
        (DataType::String, Some(Value::Integer(n))) => Ok(Value::Str(n.to_string())),
        (DataType::String, Some(Value::Str(s))) => Ok(Value::Str(s)),
        (DataType::Int | DataType::String, None) => {
            Err(EvalError::ArgumentCount { expected: 2, got })
        }
        (DataType::Channel(elem), size) => {
            let capacity = size_arg(size)?;
            Ok(Value::Channel(Channel::new((**elem).clone(), capacity)))
        }
        (DataType::Slice(elem), size) => {
            let len = size_arg(size)?;
            let items = (0..len).map(|_| Value::zero(elem)).collect();
            Ok(Value::Slice(Arc::new(Slice::new((**elem).clone(), items))))
        }
        _ => Err(EvalError::CannotMake(ty)),
    }
}

/// Optional non-negative size argument; absent means zero.
fn size_arg(arg: Option<Value>) -> EvalResult<usize> {
    match arg {
        None => Ok(0),
        Some(Value::Integer(n)) => usize::try_from(n)
            .map_err(|_| Builtin::Make.error(format!("negative size {n}"))),
        Some(other) => Err(Builtin::Make.error(format!(
            "size must be int, got {}",
            other.data_type()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::BufferConsole;
    use crate::interpreter::eval::{Context, NoOpShell};
    use crate::interpreter::scope::new_slot;
    use crate::interpreter::value::Reference;
    use crate::scheduler::TaskPool;
    use rstest::rstest;

    fn interpreter(console: Arc<BufferConsole>) -> (TaskPool, Interpreter) {
        let pool = TaskPool::new("builtin-test").unwrap();
        let interpreter = Interpreter::new(Context {
            console,
            shell: Arc::new(NoOpShell),
            tasks: pool.handle(),
            script_name: String::new(),
            args: Vec::new(),
            interactive: Vec::new(),
        });
        (pool, interpreter)
    }

    fn ints(items: &[i64]) -> Value {
        Value::Slice(Arc::new(Slice::new(
            DataType::Int,
            items.iter().map(|n| Value::Integer(*n)).collect(),
        )))
    }

    fn call(builtin: Builtin, args: Vec<Value>) -> EvalResult<Value> {
        let (_pool, interpreter) = interpreter(Arc::new(BufferConsole::new()));
        builtin.call(&interpreter, args)
    }

    #[test]
    fn names_round_trip() {
        for builtin in Builtin::ALL {
            assert_eq!(Builtin::from_name(builtin.name()), Some(builtin));
            assert!(BUILTIN_NAMES.contains(&builtin.name()));
        }
        assert_eq!(Builtin::from_name("printf"), None);
    }

    #[test]
    fn print_writes_inspections() {
        let console = Arc::new(BufferConsole::new());
        let (_pool, interpreter) = interpreter(console.clone());
        let result = Builtin::Print.call(&interpreter, vec![Value::Integer(1), "a".into(), ints(&[1, 2])]);
        assert_eq!(result, Ok(Value::Nil));
        assert_eq!(console.output(), "1 a [1, 2] \n");
    }

    #[rstest]
    #[case::slice(ints(&[1, 2, 3]), 3)]
    #[case::string(Value::Str("héllo".into()), 6)]
    #[case::empty_channel(Value::Channel(Channel::new(DataType::Int, 4)), 0)]
    fn len_of(#[case] value: Value, #[case] expected: i64) {
        assert_eq!(call(Builtin::Len, vec![value]), Ok(Value::Integer(expected)));
    }

    #[test]
    fn len_rejects_wrong_arity() {
        assert_eq!(
            call(Builtin::Len, vec![]),
            Err(EvalError::ArgumentCount { expected: 1, got: 0 })
        );
    }

    #[test]
    fn append_builds_new_slice() {
        let original = ints(&[1]);
        let appended = call(Builtin::Append, vec![original.clone(), Value::Integer(2), Value::Integer(3)]).unwrap();
        assert_eq!(appended.to_string(), "[1, 2, 3]");
        assert_eq!(original.to_string(), "[1]");
    }

    #[test]
    fn append_checks_element_type() {
        let err = call(Builtin::Append, vec![ints(&[]), "s".into()]).unwrap_err();
        assert_eq!(err.to_string(), "cannot append string to []int");
    }

    #[test]
    fn read_fills_referent_by_type() {
        let console = Arc::new(BufferConsole::with_input("42 word true"));
        let (_pool, interpreter) = interpreter(console);
        let n = Reference::new(DataType::Int, new_slot(Value::Integer(0)));
        let s = Reference::new(DataType::String, new_slot(Value::Str(String::new())));
        let b = Reference::new(DataType::Bool, new_slot(Value::Boolean(false)));
        for r in [&n, &s, &b] {
            Builtin::Read
                .call(&interpreter, vec![Value::Reference(r.clone())])
                .unwrap();
        }
        assert_eq!(n.get(), Value::Integer(42));
        assert_eq!(s.get(), Value::Str("word".into()));
        assert_eq!(b.get(), Value::Boolean(true));
    }

    #[test]
    fn read_rejects_bad_integer() {
        let console = Arc::new(BufferConsole::with_input("abc"));
        let (_pool, interpreter) = interpreter(console);
        let n = Reference::new(DataType::Int, new_slot(Value::Integer(0)));
        let err = Builtin::Read
            .call(&interpreter, vec![Value::Reference(n)])
            .unwrap_err();
        assert_eq!(err.to_string(), "could not parse \"abc\" as integer");
    }

    #[rstest]
    #[case::int_from_string(vec![Value::DataType(DataType::Int), "12".into()], "12")]
    #[case::string_from_int(vec![Value::DataType(DataType::String), Value::Integer(7)], "7")]
    #[case::slice(vec![Value::DataType(DataType::slice_of(DataType::Bool)), Value::Integer(2)], "[false, false]")]
    #[case::channel(vec![Value::DataType(DataType::channel_of(DataType::Int)), Value::Integer(1)], "chan int")]
    #[case::rendezvous(vec![Value::DataType(DataType::channel_of(DataType::String))], "chan string")]
    fn make_values(#[case] args: Vec<Value>, #[case] expected: &str) {
        assert_eq!(call(Builtin::Make, args).unwrap().to_string(), expected);
    }

    #[rstest]
    #[case::bool_type(vec![Value::DataType(DataType::Bool)], "cannot make bool")]
    #[case::not_a_type(vec![Value::Integer(1)], "cannot make int")]
    #[case::bad_int(vec![Value::DataType(DataType::Int), "x".into()], "could not parse \"x\" as integer")]
    #[case::negative(vec![Value::DataType(DataType::slice_of(DataType::Int)), Value::Integer(-1)], "make: negative size -1")]
    #[case::extra_conversion_arg(vec![Value::DataType(DataType::Int), Value::Integer(1), Value::Integer(2)], "wrong number of arguments: expected 2, got 3")]
    #[case::extra_size_arg(vec![Value::DataType(DataType::channel_of(DataType::Int)), Value::Integer(1), Value::Integer(4)], "wrong number of arguments: expected 2, got 3")]
    fn make_errors(#[case] args: Vec<Value>, #[case] expected: &str) {
        assert_eq!(call(Builtin::Make, args).unwrap_err().to_string(), expected);
    }
}
