use r2d2::Pool;

use crate::db::db_pool::{memory_pool, DuckDBConnectionManager};

pub const CREATE_ALUNOS: &str = "
    CREATE TABLE alunos (
        id INTEGER PRIMARY KEY,
        aluno_data_nascimento DATE,
        aluno_genero VARCHAR,
        raca VARCHAR,
        bolsa_familia BOOLEAN,
        zona_localizacao VARCHAR,
        bairro VARCHAR,
        cidade VARCHAR,
        escola VARCHAR,
        curso VARCHAR,
        serie VARCHAR,
        matricula_id INTEGER NOT NULL UNIQUE
    );
    INSERT INTO alunos VALUES
        (1, '2010-03-01', 'Feminino', 'Parda', true, 'Urbana', 'Centro', 'Recife', 'Escola A', 'Fundamental', '5º ano', 1001),
        (2, '2011-07-15', 'Masculino', 'Branca', false, 'Rural', 'Várzea', 'Recife', 'Escola A', 'Fundamental', '4º ano', 1002),
        (3, '2009-11-30', 'Feminino', 'Preta', true, 'Urbana', 'Boa Vista', 'Olinda', 'Escola B', 'Fundamental', '6º ano', 1003);
";

/// In-memory pool holding a small `alunos` table.
pub fn seeded_pool() -> Pool<DuckDBConnectionManager> {
    let pool = memory_pool();
    pool.get().unwrap().execute_batch(CREATE_ALUNOS).unwrap();
    pool
}
