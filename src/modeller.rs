//! Builds the small graphs that travel through the pipeline: one per reading
//! on the way in, one per window of query results on the way out.

use crate::error::{IotStreamsError, Result};
use crate::reading::{Reading, SensorKind};
use crate::vocab;
use chrono::SecondsFormat;
use oxigraph::model::vocab::{rdf, xsd};
use oxigraph::model::{Graph, GraphName, Literal, NamedNode, Quad, Term, Triple};
use std::collections::HashMap;
use uuid::Uuid;

/// Expresses readings in the SSN ontology.
///
/// Keeps the last observation of every sensor kind so each new observation
/// can point back at it with `fs:follows`. The first observation of a kind
/// has no such link.
#[derive(Debug, Default)]
pub struct SsnModeller {
    last_observation: HashMap<SensorKind, NamedNode>,
}

impl SsnModeller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent observation minted for `kind`.
    pub fn last_observation(&self, kind: SensorKind) -> Option<&NamedNode> {
        self.last_observation.get(&kind)
    }

    pub fn model(&mut self, reading: &Reading) -> Result<Graph> {
        let (system, observed_property) = match reading.kind {
            SensorKind::WirelessTag => (
                format!("{}system/wirelesstag/{}", vocab::BASE, reading.sensor_id),
                vocab::fs_ext("meatSurfaceTemp"),
            ),
            SensorKind::MeatProbe => (
                format!("{}sensor/meatProbe/mp", vocab::BASE),
                vocab::fs_ext("meatCoreTemp"),
            ),
        };
        let system = NamedNode::new_unchecked(system);
        let sensor = mint("sensor/sensingDevice");
        let observation = mint("observation/temperature");
        let output = mint("sensorOutput/temperature");
        let value = mint("observationValue/temperature");
        let property = NamedNode::new_unchecked(observed_property);
        let foi = NamedNode::new(reading.foi.clone())
            .map_err(|e| IotStreamsError::user_input(reading.foi.clone(), e))?;

        let mut g = Graph::new();
        typed(&mut g, &system, &vocab::ssn("System"));
        typed(&mut g, &sensor, &vocab::ssn("SensingDevice"));
        typed(&mut g, &sensor, &vocab::meteo(vocab::TEMPERATURE_SENSOR));
        link(&mut g, &system, &vocab::ssn("hasSubsystem"), sensor.clone());
        typed(&mut g, &observation, &vocab::ssn("Observation"));
        typed(&mut g, &output, &vocab::ssn("SensorOutput"));
        typed(&mut g, &value, &vocab::sk("QuantityObservationValue"));
        typed(&mut g, &property, &vocab::ssn("Property"));
        typed(&mut g, &foi, &vocab::ssn("FeatureOfInterest"));

        let sampled = reading
            .timestamp
            .to_rfc3339_opts(SecondsFormat::AutoSi, false);
        link(
            &mut g,
            &observation,
            &vocab::ssn("observationSamplingTime"),
            Literal::new_typed_literal(sampled, xsd::DATE_TIME),
        );
        link(&mut g, &output, &vocab::ssn("isProducedBy"), sensor.clone());
        link(&mut g, &observation, &vocab::ssn("observationResult"), output.clone());
        link(&mut g, &output, &vocab::ssn("hasValue"), value.clone());
        link(
            &mut g,
            &value,
            &vocab::sk("hasQuantityValue"),
            Literal::from(reading.temperature),
        );
        link(&mut g, &observation, &vocab::ssn("featureOfInterest"), foi.clone());
        link(&mut g, &foi, &vocab::ssn("hasProperty"), property.clone());
        link(&mut g, &sensor, &vocab::ssn("observes"), property);
        if let Some(previous) = self.last_observation.get(&reading.kind) {
            link(&mut g, &observation, &vocab::fs("follows"), previous.clone());
        }

        self.last_observation.insert(reading.kind, observation);
        Ok(g)
    }
}

fn link(graph: &mut Graph, subject: &NamedNode, predicate: &str, object: impl Into<Term>) {
    graph.insert(&Triple::new(
        subject.clone(),
        NamedNode::new_unchecked(predicate),
        object,
    ));
}

fn typed(graph: &mut Graph, subject: &NamedNode, class: &str) {
    link(graph, subject, rdf::TYPE.as_str(), NamedNode::new_unchecked(class));
}

fn mint(kind: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{}{}/{}", vocab::BASE, kind, Uuid::new_v4()))
}

/// Turns query result rows of (subject, predicate, object) into a graph.
///
/// Rows of any other width, unbound cells and non-IRI predicates are
/// configuration errors in the registered query. Blank nodes are refused.
pub fn rows_to_graph(rows: &[Vec<Option<Term>>]) -> Result<Graph> {
    let mut graph = Graph::new();
    for row in rows {
        let [s, p, o] = row.as_slice() else {
            return Err(IotStreamsError::configuration(
                "continuous query",
                format!("result rows must have 3 columns, got {}", row.len()),
            ));
        };
        let (Some(s), Some(p), Some(o)) = (s, p, o) else {
            return Err(IotStreamsError::configuration(
                "continuous query",
                "result row has an unbound column",
            ));
        };
        let subject = match s {
            Term::NamedNode(n) => n.clone(),
            Term::BlankNode(_) => {
                return Err(IotStreamsError::internal(format!("blank node subject {s}")));
            }
            other => {
                return Err(IotStreamsError::configuration(
                    "continuous query",
                    format!("subject {other} is not an IRI"),
                ));
            }
        };
        let Term::NamedNode(predicate) = p else {
            return Err(IotStreamsError::configuration(
                "continuous query",
                format!("predicate {p} is not an IRI"),
            ));
        };
        if o.is_blank_node() {
            return Err(IotStreamsError::internal(format!("blank node object in {s} {p}")));
        }
        graph.insert(&Triple::new(subject, predicate.clone(), o.clone()));
    }
    Ok(graph)
}

/// Places every triple of `graph` in the default graph, refusing blank nodes.
pub fn graph_to_quads(graph: &Graph) -> Result<Vec<Quad>> {
    let mut quads = Vec::with_capacity(graph.len());
    for triple in graph.iter() {
        let triple = triple.into_owned();
        if triple.subject.is_blank_node() || triple.object.is_blank_node() {
            return Err(IotStreamsError::internal(format!("blank node in {triple}")));
        }
        quads.push(triple.in_graph(GraphName::DefaultGraph));
    }
    Ok(quads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_range::DEFAULT_TIME_ZONE;
    use chrono::TimeZone;
    use oxigraph::model::BlankNode;

    fn reading(kind: SensorKind, minute: u32, temperature: f64) -> Reading {
        let t = DEFAULT_TIME_ZONE
            .with_ymd_and_hms(2016, 1, 31, 9, minute, 0)
            .unwrap();
        match kind {
            SensorKind::WirelessTag => Reading::wireless_tag(3, t, temperature, 40.0),
            SensorKind::MeatProbe => Reading::meat_probe(1, t, temperature),
        }
    }

    fn objects(graph: &Graph, predicate: &str) -> Vec<Term> {
        graph
            .iter()
            .filter(|t| t.predicate.as_str() == predicate)
            .map(|t| t.object.into_owned())
            .collect()
    }

    #[test]
    fn test_reading_graph_shape() {
        let mut modeller = SsnModeller::new();
        let graph = modeller
            .model(&reading(SensorKind::WirelessTag, 0, 20.0))
            .unwrap();
        assert_eq!(graph.len(), 17);

        let values = objects(&graph, &vocab::sk("hasQuantityValue"));
        assert_eq!(values, vec![Term::from(Literal::from(20.0))]);

        let times = objects(&graph, &vocab::ssn("observationSamplingTime"));
        let Term::Literal(time) = &times[0] else {
            panic!("sampling time is not a literal");
        };
        assert_eq!(time.datatype(), xsd::DATE_TIME);
        assert_eq!(time.value(), "2016-01-31T09:00:00+00:00");
        assert!(objects(&graph, &vocab::fs("follows")).is_empty());
    }

    #[test]
    fn test_follows_chain_per_kind() {
        let mut modeller = SsnModeller::new();
        modeller.model(&reading(SensorKind::WirelessTag, 0, 20.0)).unwrap();
        let first_tag = modeller.last_observation(SensorKind::WirelessTag).cloned().unwrap();

        let probe = modeller.model(&reading(SensorKind::MeatProbe, 1, 60.0)).unwrap();
        assert!(objects(&probe, &vocab::fs("follows")).is_empty());

        let second = modeller.model(&reading(SensorKind::WirelessTag, 2, 21.0)).unwrap();
        assert_eq!(
            objects(&second, &vocab::fs("follows")),
            vec![Term::from(first_tag.clone())]
        );
        assert_ne!(
            modeller.last_observation(SensorKind::WirelessTag),
            Some(&first_tag)
        );
    }

    #[test]
    fn test_observation_ids_are_fresh() {
        let mut modeller = SsnModeller::new();
        let r = reading(SensorKind::MeatProbe, 0, 5.0);
        modeller.model(&r).unwrap();
        let a = modeller.last_observation(SensorKind::MeatProbe).cloned();
        modeller.model(&r).unwrap();
        let b = modeller.last_observation(SensorKind::MeatProbe).cloned();
        assert_ne!(a, b);
    }

    #[test]
    fn test_bad_foi_is_user_input() {
        let mut modeller = SsnModeller::new();
        let r = reading(SensorKind::MeatProbe, 0, 5.0).with_foi("not an iri");
        assert!(matches!(
            modeller.model(&r),
            Err(IotStreamsError::UserInput { .. })
        ));
    }

    #[test]
    fn test_rows_keep_typed_literals() {
        let s = Term::from(NamedNode::new("http://example.org/s").unwrap());
        let p = Term::from(NamedNode::new("http://example.org/p").unwrap());
        let o = Term::from(Literal::new_typed_literal(
            "2016-01-31T09:00:00Z",
            xsd::DATE_TIME,
        ));
        let graph = rows_to_graph(&[vec![Some(s), Some(p), Some(o.clone())]]).unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(objects(&graph, "http://example.org/p"), vec![o]);
    }

    #[test]
    fn test_row_width_is_configuration_error() {
        let s = Term::from(NamedNode::new("http://example.org/s").unwrap());
        let err = rows_to_graph(&[vec![Some(s.clone()), Some(s)]]).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_blank_node_is_internal_error() {
        let s = Term::from(NamedNode::new("http://example.org/s").unwrap());
        let b = Term::from(BlankNode::default());
        let err = rows_to_graph(&[vec![Some(s.clone()), Some(s), Some(b)]]).unwrap_err();
        assert!(matches!(err, IotStreamsError::Internal(_)));

        let mut graph = Graph::new();
        graph.insert(&Triple::new(
            BlankNode::default(),
            NamedNode::new("http://example.org/p").unwrap(),
            Literal::from(1),
        ));
        assert!(matches!(
            graph_to_quads(&graph),
            Err(IotStreamsError::Internal(_))
        ));
    }
}
