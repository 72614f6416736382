//! Postgres [`SpecificationRepository`]/[`MoleculeRepository`] (§4.5).

use async_trait::async_trait;
use sqlx::Row;

use crate::domain::error::CoreResult;
use crate::domain::models::{Molecule, Specification};
use crate::domain::ports::{MoleculeRepository, Session, SpecificationRepository};

use super::session::PgSession;

pub struct PgSpecificationRepository;

#[async_trait]
impl SpecificationRepository for PgSpecificationRepository {
    async fn find_by_hash(&self, session: &mut dyn Session, hash: &str) -> CoreResult<Option<Specification>> {
        let tx = PgSession::executor(session);
        let row = sqlx::query("SELECT * FROM specification WHERE canonical_hash = $1").bind(hash).fetch_optional(&mut **tx).await?;
        row.map(|row| -> CoreResult<Specification> {
            Ok(Specification {
                id: row.try_get("id")?,
                program: row.try_get("program")?,
                method: row.try_get("method")?,
                basis: row.try_get("basis")?,
                keywords: row.try_get("keywords")?,
                protocols: row.try_get("protocols")?,
            })
        })
        .transpose()
    }

    async fn create(&self, session: &mut dyn Session, specification: Specification) -> CoreResult<Specification> {
        let tx = PgSession::executor(session);
        let hash = specification.canonical_hash();
        let row = sqlx::query(
            "INSERT INTO specification (program, method, basis, keywords, protocols, canonical_hash) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(&specification.program)
        .bind(&specification.method)
        .bind(&specification.basis)
        .bind(&specification.keywords)
        .bind(&specification.protocols)
        .bind(hash)
        .fetch_one(&mut **tx)
        .await?;
        Ok(Specification { id: row.try_get("id")?, ..specification })
    }

    async fn get(&self, session: &mut dyn Session, id: i64) -> CoreResult<Specification> {
        let tx = PgSession::executor(session);
        let row = sqlx::query("SELECT * FROM specification WHERE id = $1").bind(id).fetch_one(&mut **tx).await?;
        Ok(Specification {
            id: row.try_get("id")?,
            program: row.try_get("program")?,
            method: row.try_get("method")?,
            basis: row.try_get("basis")?,
            keywords: row.try_get("keywords")?,
            protocols: row.try_get("protocols")?,
        })
    }
}

pub struct PgMoleculeRepository;

#[async_trait]
impl MoleculeRepository for PgMoleculeRepository {
    async fn find_by_hash(&self, session: &mut dyn Session, hash: &str) -> CoreResult<Option<Molecule>> {
        let tx = PgSession::executor(session);
        let row = sqlx::query("SELECT * FROM molecule WHERE canonical_hash = $1").bind(hash).fetch_optional(&mut **tx).await?;
        row.map(|row| -> CoreResult<Molecule> {
            let symbols: serde_json::Value = row.try_get("symbols")?;
            let geometry: serde_json::Value = row.try_get("geometry")?;
            Ok(Molecule {
                id: row.try_get("id")?,
                symbols: serde_json::from_value(symbols)?,
                geometry: serde_json::from_value(geometry)?,
                molecular_charge: row.try_get("molecular_charge")?,
                molecular_multiplicity: row.try_get("molecular_multiplicity")?,
                identifiers: row.try_get("identifiers")?,
            })
        })
        .transpose()
    }

    async fn create(&self, session: &mut dyn Session, molecule: Molecule) -> CoreResult<Molecule> {
        let tx = PgSession::executor(session);
        let hash = molecule.canonical_hash();
        let symbols = serde_json::to_value(&molecule.symbols)?;
        let geometry = serde_json::to_value(&molecule.geometry)?;
        let row = sqlx::query(
            "INSERT INTO molecule (symbols, geometry, molecular_charge, molecular_multiplicity, identifiers, canonical_hash) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(symbols)
        .bind(geometry)
        .bind(molecule.molecular_charge)
        .bind(molecule.molecular_multiplicity)
        .bind(&molecule.identifiers)
        .bind(hash)
        .fetch_one(&mut **tx)
        .await?;
        Ok(Molecule { id: row.try_get("id")?, ..molecule })
    }

    async fn get(&self, session: &mut dyn Session, id: i64) -> CoreResult<Molecule> {
        let tx = PgSession::executor(session);
        let row = sqlx::query("SELECT * FROM molecule WHERE id = $1").bind(id).fetch_one(&mut **tx).await?;
        let symbols: serde_json::Value = row.try_get("symbols")?;
        let geometry: serde_json::Value = row.try_get("geometry")?;
        Ok(Molecule {
            id: row.try_get("id")?,
            symbols: serde_json::from_value(symbols)?,
            geometry: serde_json::from_value(geometry)?,
            molecular_charge: row.try_get("molecular_charge")?,
            molecular_multiplicity: row.try_get("molecular_multiplicity")?,
            identifiers: row.try_get("identifiers")?,
        })
    }
}
