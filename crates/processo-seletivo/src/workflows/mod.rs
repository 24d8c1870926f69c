pub mod cadastro;
pub mod inscricao;
