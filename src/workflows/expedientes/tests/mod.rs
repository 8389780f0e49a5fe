mod common;
mod documentos;
