use std::{
  fmt,
  rc::Rc,
};

/// The display name attached to a binder or variable. Binding is by node
/// identity in the graph and by index in a [`Term`], so equal names never
/// collide; they only label readback and diagnostics.
#[derive(Clone, PartialEq, Eq)]
pub struct Name(Rc<str>);

impl fmt::Display for Name {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

// Diagnostics print names bare, the same way the graph dumps do.
impl fmt::Debug for Name {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(self, f)
  }
}

impl From<&str> for Name {
  fn from(s: &str) -> Name { Name(Rc::from(s)) }
}

impl From<String> for Name {
  fn from(s: String) -> Name { Name(Rc::from(s)) }
}

/// A λ-term as a tree, with de Bruijn indices alongside display names.
/// This is the construction and readback format for the graph; an index at
/// or above the enclosing binder depth denotes a free variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Term {
  Var(Name, u64),
  Lam(Name, Box<Term>),
  App(Box<(Term, Term)>),
  /// The symbol of an opaque primitive. Readback only: a primitive cannot
  /// be rebuilt from its symbol.
  Opr(String),
}

impl Term {
  pub fn var(nam: &str, idx: u64) -> Self { Term::Var(Name::from(nam), idx) }

  pub fn lam(nam: &str, bod: Term) -> Self {
    Term::Lam(Name::from(nam), Box::new(bod))
  }

  pub fn app(fun: Term, arg: Term) -> Self {
    Term::App(Box::new((fun, arg)))
  }

  pub fn pretty(&self) -> String {
    use Term::*;

    fn is_atom(term: &Term) -> bool { matches!(term, Var(..) | Opr(..)) }

    fn lams(nam: &Name, bod: &Term) -> String {
      match bod {
        Lam(nam2, bod2) => format!("{} {}", nam, lams(nam2, bod2)),
        _ => format!("{} => {}", nam, bod.pretty()),
      }
    }

    fn parens(term: &Term) -> String {
      if is_atom(term) {
        term.pretty()
      }
      else {
        format!("({})", term.pretty())
      }
    }

    fn apps(fun: &Term, arg: &Term) -> String {
      match (fun, arg) {
        (App(f), App(a)) => {
          format!("{} ({})", apps(&f.0, &f.1), apps(&a.0, &a.1))
        }
        (App(f), arg) => format!("{} {}", apps(&f.0, &f.1), parens(arg)),
        (fun, App(a)) => format!("{} ({})", parens(fun), apps(&a.0, &a.1)),
        (fun, arg) => format!("{} {}", parens(fun), parens(arg)),
      }
    }

    match self {
      Var(nam, _) => nam.to_string(),
      Lam(nam, bod) => format!("λ {}", lams(nam, bod)),
      App(fun_arg) => apps(&fun_arg.0, &fun_arg.1),
      Opr(sym) => sym.clone(),
    }
  }
}

impl fmt::Display for Term {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.pretty())
  }
}
