mod c;
mod cpp;
mod go;
mod haskell;
mod ocaml;
mod rust_target;
