//! Business types shared by the integration tests.

#![allow(dead_code)]

use objtx::core::ObjectId;
use objtx::transaction::{object_ref, ObjectRef, ReplayRegistry, ReplayTable, ReplayValue};
use std::rc::Rc;

pub struct Kunde {
    pub id: Option<ObjectId>,
    pub version: Option<String>,
    pub nachname: Option<String>,
    pub alter: i64,
    pub adresse: Option<ObjectRef>,
    pub vertraege: Vec<ObjectRef>,
}
objtx::transacted_object!(Kunde { id: id, version: version });

pub struct Vertrag {
    pub id: Option<ObjectId>,
    pub version: Option<String>,
    pub nummer: Option<String>,
}
objtx::transacted_object!(Vertrag { id: id, version: version });

pub struct Adresse {
    pub id: Option<ObjectId>,
    pub version: Option<String>,
    pub ort: Option<String>,
}
objtx::transacted_object!(Adresse { id: id, version: version });

pub fn kunde_id(nr: &str) -> ObjectId {
    ObjectId::new("kunde", "kundennr", nr)
}

pub fn vertrag_id(nr: &str) -> ObjectId {
    ObjectId::new("vertrag", "nummer", nr)
}

pub fn adresse_id(nr: &str) -> ObjectId {
    ObjectId::new("adresse", "nr", nr)
}

pub fn kunde(nr: &str) -> ObjectRef {
    object_ref(Kunde {
        id: Some(kunde_id(nr)),
        version: Some("1".to_string()),
        nachname: None,
        alter: 0,
        adresse: None,
        vertraege: Vec::new(),
    })
}

pub fn vertrag(nr: &str) -> ObjectRef {
    object_ref(Vertrag {
        id: Some(vertrag_id(nr)),
        version: Some("1".to_string()),
        nummer: None,
    })
}

pub fn adresse(nr: &str) -> ObjectRef {
    object_ref(Adresse {
        id: Some(adresse_id(nr)),
        version: Some("1".to_string()),
        ort: None,
    })
}

/// Adresse that has not been assigned an id yet.
pub fn unsaved_adresse() -> ObjectRef {
    object_ref(Adresse {
        id: None,
        version: None,
        ort: None,
    })
}

pub fn with_kunde<R>(object: &ObjectRef, f: impl FnOnce(&Kunde) -> R) -> R {
    let guard = object.borrow();
    let kunde = guard
        .as_any()
        .downcast_ref::<Kunde>()
        .expect("object is a Kunde");
    f(kunde)
}

pub fn id(object: &ObjectRef) -> ObjectId {
    object.borrow().object_id().expect("object has an id")
}

pub fn ids(objects: &[ObjectRef]) -> Vec<ObjectId> {
    objects.iter().map(id).collect()
}

pub fn same(a: &ObjectRef, b: &ObjectRef) -> bool {
    Rc::ptr_eq(a, b)
}

/// Accessors for every relation the tests write.
pub fn registry() -> ReplayRegistry {
    ReplayRegistry::new()
        .with(
            "kunde",
            ReplayTable::<Kunde>::new()
                .setter("nachname", |k, v| k.nachname = v.into_text())
                .setter("alter", |k, v| {
                    k.alter = v.as_value().and_then(|v| v.as_int()).unwrap_or_default()
                })
                .setter("adresse", |k, v: ReplayValue| k.adresse = v.into_object())
                .adder("vertraege", |k, v| k.vertraege.push(v))
                .remover("vertraege", |k, v| {
                    k.vertraege.retain(|existing| !Rc::ptr_eq(existing, &v))
                }),
        )
        .with(
            "vertrag",
            ReplayTable::<Vertrag>::new().setter("nummer", |v, value| v.nummer = value.into_text()),
        )
        .with(
            "adresse",
            ReplayTable::<Adresse>::new().setter("ort", |a, value| a.ort = value.into_text()),
        )
}
